use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{default_true, trim_opt};

/// Payment term, e.g. `NET30`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerm {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Days until payment is due.
    #[serde(default)]
    pub days: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl PaymentTerm {
    pub const MAX_DAYS: u16 = 365;

    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_uppercase();
        self.name = self.name.trim().to_string();
        trim_opt(&mut self.description);
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)?;
        if self.days > Self::MAX_DAYS {
            return Err(ServiceError::Validation(format!(
                "days must be at most {}",
                Self::MAX_DAYS
            )));
        }
        Ok(())
    }
}
