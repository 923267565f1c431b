use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{default_true, trim_opt};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Brand {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        trim_opt(&mut self.country_code);
        if let Some(cc) = &mut self.country_code {
            *cc = cc.to_uppercase();
        }
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)
    }
}
