use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{check_email, trim_opt};
use crate::acl::{Overrides, RoleAssignment};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvisioningStatus {
    #[default]
    Pending,
    Applied,
    Rejected,
}

/// A pending account request. Applying it creates or updates the user with
/// the same e-mail and copies the claims bundle onto it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProvisioning {
    #[serde(default)]
    pub id: String,
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
    #[serde(default)]
    pub status: ProvisioningStatus,
    /// User.code written when the request is applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl UserProvisioning {
    pub(crate) fn normalize(&mut self) {
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
        require_field("displayName", &self.display_name)
    }
}
