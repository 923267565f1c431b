use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::trim_opt;

/// Unit of measure (PCS, KG, M, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Decimal places used when displaying quantities.
    #[serde(default)]
    pub precision: u8,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Unit {
    pub const MAX_PRECISION: u8 = 6;

    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_uppercase();
        self.name = self.name.trim().to_string();
        trim_opt(&mut self.symbol);
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)?;
        if self.precision > Self::MAX_PRECISION {
            return Err(ServiceError::Validation(format!(
                "precision must be at most {}",
                Self::MAX_PRECISION
            )));
        }
        Ok(())
    }
}
