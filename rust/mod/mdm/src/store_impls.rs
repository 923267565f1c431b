//! `Document` bindings for every stored model.

use openerp_core::{ServiceError, new_id};
use openerp_store::Document;

use crate::model::*;

/// Bind a coded model to its collection. Normalisation runs on create and
/// update; `check` runs after the key is assigned.
macro_rules! coded_document {
    ($ty:ty, $collection:literal) => {
        coded_document!(@impl $ty, $collection, None, &[]);
    };
    ($ty:ty, $collection:literal, series = $series:literal) => {
        coded_document!(@impl $ty, $collection, Some($series), &[]);
    };
    ($ty:ty, $collection:literal, series = $series:literal, unique = [$($field:literal),+]) => {
        coded_document!(@impl $ty, $collection, Some($series), &[$($field),+]);
    };
    (@impl $ty:ty, $collection:literal, $series:expr, $unique:expr) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;
            const SEQUENCE: Option<&'static str> = $series;
            const UNIQUE: &'static [&'static str] = $unique;

            fn key_value(&self) -> &str {
                &self.code
            }

            fn set_key(&mut self, key: String) {
                self.code = key;
            }

            fn before_create(&mut self) {
                self.normalize();
            }

            fn before_update(&mut self) {
                self.normalize();
            }

            fn validate(&self) -> Result<(), ServiceError> {
                self.check()
            }
        }
    };
}

coded_document!(Material, "materials", series = "PART_PS");
coded_document!(MaterialCategory, "materialCategories");
coded_document!(Unit, "units");
coded_document!(Supplier, "suppliers", series = "SUPPLIER");
coded_document!(Brand, "brands");
coded_document!(Country, "countries");
coded_document!(Warehouse, "warehouses");
coded_document!(Employee, "employees", series = "EMPLOYEE");
coded_document!(User, "users", series = "USER", unique = ["email"]);
coded_document!(PaymentTerm, "paymentTerms");
coded_document!(PurchaseMethod, "purchaseMethods", series = "PURCHASE_METHOD");

impl Document for UserProvisioning {
    const COLLECTION: &'static str = "userProvisioning";
    const KEY_FIELD: &'static str = "id";

    fn key_value(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    /// New requests always start pending; only `apply` moves them on.
    fn before_create(&mut self) {
        if self.id.trim().is_empty() {
            self.id = new_id();
        }
        self.status = ProvisioningStatus::Pending;
        self.user_code = None;
        self.applied_at = None;
        self.normalize();
    }

    fn before_update(&mut self) {
        self.normalize();
    }

    fn keep_managed(&mut self, stored: &Self) {
        self.status = stored.status;
        self.user_code = stored.user_code.clone();
        self.applied_at = stored.applied_at.clone();
    }

    fn validate(&self) -> Result<(), ServiceError> {
        self.check()
    }
}

impl Document for FileAttachment {
    const COLLECTION: &'static str = "files";
    const KEY_FIELD: &'static str = "id";

    fn key_value(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn before_create(&mut self) {
        if self.id.trim().is_empty() {
            self.id = new_id();
        }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        self.check()
    }
}
