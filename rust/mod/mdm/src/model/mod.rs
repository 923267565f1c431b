mod brand;
mod country;
mod employee;
mod file;
mod material;
mod payment_term;
mod provisioning;
mod purchase_method;
mod sequence;
mod supplier;
mod unit;
mod user;
mod warehouse;

pub use brand::*;
pub use country::*;
pub use employee::*;
pub use file::*;
pub use material::*;
pub use payment_term::*;
pub use provisioning::*;
pub use purchase_method::*;
pub use sequence::*;
pub use supplier::*;
pub use unit::*;
pub use user::*;
pub use warehouse::*;

use openerp_core::ServiceError;

pub(crate) fn default_true() -> bool {
    true
}

/// Trim an optional text field, dropping it when blank.
pub(crate) fn trim_opt(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

pub(crate) fn check_email(field: &str, value: &str) -> Result<(), ServiceError> {
    let ok = value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if ok {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "{} '{}' is not an e-mail address",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_becomes_none() {
        let mut v = Some("  ".to_string());
        trim_opt(&mut v);
        assert_eq!(v, None);

        let mut v = Some(" Taipei ".to_string());
        trim_opt(&mut v);
        assert_eq!(v.as_deref(), Some("Taipei"));
    }

    #[test]
    fn email_shape() {
        assert!(check_email("email", "amy@example.com").is_ok());
        assert!(check_email("email", "amy").is_err());
        assert!(check_email("email", "@example.com").is_err());
    }
}
