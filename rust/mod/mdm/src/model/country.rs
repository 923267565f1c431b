use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::trim_opt;

/// Country keyed by ISO 3166-1 alpha-2 code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// ISO 4217 currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Country {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_uppercase();
        self.name = self.name.trim().to_string();
        trim_opt(&mut self.currency);
        if let Some(currency) = &mut self.currency {
            *currency = currency.to_uppercase();
        }
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        if !is_alpha(&self.code, 2) {
            return Err(ServiceError::Validation(format!(
                "country code '{}' must be two letters",
                self.code
            )));
        }
        require_field("name", &self.name)?;
        if let Some(currency) = &self.currency {
            if !is_alpha(currency, 3) {
                return Err(ServiceError::Validation(format!(
                    "currency '{}' must be three letters",
                    currency
                )));
            }
        }
        Ok(())
    }
}

fn is_alpha(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_alphabetic())
}
