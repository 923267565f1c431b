use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{check_email, default_true, trim_opt};
use crate::acl::{Overrides, RoleAssignment};

/// A console account. The claims bundle (`assignments`, `overrides`) is
/// copied into every token issued for the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_code: Option<String>,
    #[serde(default)]
    pub assignments: Vec<RoleAssignment>,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl User {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.display_name = self.display_name.trim().to_string();
        trim_opt(&mut self.employee_code);
        for a in &mut self.assignments {
            a.normalize();
        }
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("email", &self.email)?;
        check_email("email", &self.email)?;
        require_field("displayName", &self.display_name)?;
        for a in &self.assignments {
            require_field("assignments.role", &a.role)?;
        }
        Ok(())
    }
}
