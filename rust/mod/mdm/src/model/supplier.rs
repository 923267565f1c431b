use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{check_email, trim_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupplierStatus {
    #[default]
    Active,
    Suspended,
}

/// A vendor. Codes come from the `SUPPLIER` series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Unified business number / VAT id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_term_code: Option<String>,
    #[serde(default)]
    pub status: SupplierStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Supplier {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        for field in [
            &mut self.short_name,
            &mut self.tax_id,
            &mut self.contact_name,
            &mut self.phone,
            &mut self.email,
            &mut self.address,
            &mut self.country_code,
            &mut self.payment_term_code,
        ] {
            trim_opt(field);
        }
        if let Some(cc) = &mut self.country_code {
            *cc = cc.to_uppercase();
        }
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)?;
        if let Some(email) = &self.email {
            check_email("email", email)?;
        }
        Ok(())
    }
}
