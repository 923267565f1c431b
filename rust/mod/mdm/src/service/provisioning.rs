use openerp_core::{ServiceError, now_rfc3339};
use openerp_store::DocOps;
use tracing::info;

use crate::model::{ProvisioningStatus, User, UserProvisioning};

/// Apply a pending provisioning request.
///
/// The user with the same e-mail (case-insensitive) is updated, or a new one
/// is created with a code from the `USER` series. Either way the request's
/// claims bundle is copied onto the user and the user is activated. E-mails
/// are unique among users, so at most one can match.
pub fn apply(
    users: &DocOps<User>,
    requests: &DocOps<UserProvisioning>,
    id: &str,
) -> Result<UserProvisioning, ServiceError> {
    let request = requests.get_or_err(id)?;
    require_pending(&request)?;

    let existing = users
        .all()?
        .into_iter()
        .find(|u| u.email.eq_ignore_ascii_case(&request.email));

    let user = match existing {
        Some(mut user) => {
            user.employee_code = request.employee_code.clone();
            user.assignments = request.assignments.clone();
            user.overrides = request.overrides.clone();
            user.active = true;
            let code = user.code.clone();
            users.update(&code, user)?
        }
        None => users.create(User {
            code: String::new(),
            email: request.email.clone(),
            display_name: request.display_name.clone(),
            employee_code: request.employee_code.clone(),
            assignments: request.assignments.clone(),
            overrides: request.overrides.clone(),
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
        })?,
    };

    let applied = requests.modify(id, |r| {
        require_pending(r)?;
        r.status = ProvisioningStatus::Applied;
        r.user_code = Some(user.code.clone());
        r.applied_at = Some(now_rfc3339());
        Ok(())
    })?;
    info!("provisioning: applied {} to user {}", id, user.code);
    Ok(applied)
}

/// Decline a pending request. No user is touched.
pub fn reject(
    requests: &DocOps<UserProvisioning>,
    id: &str,
) -> Result<UserProvisioning, ServiceError> {
    let rejected = requests.modify(id, |r| {
        require_pending(r)?;
        r.status = ProvisioningStatus::Rejected;
        Ok(())
    })?;
    info!("provisioning: rejected {}", id);
    Ok(rejected)
}

fn require_pending(request: &UserProvisioning) -> Result<(), ServiceError> {
    if request.status != ProvisioningStatus::Pending {
        return Err(ServiceError::Conflict(format!(
            "provisioning request '{}' is {:?}, not pending",
            request.id, request.status
        )));
    }
    Ok(())
}
