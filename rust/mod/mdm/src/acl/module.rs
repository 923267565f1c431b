use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission-bearing area of the console. One per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Module {
    Materials,
    MaterialCategories,
    Units,
    Suppliers,
    Brands,
    Countries,
    Warehouses,
    Employees,
    Users,
    UserProvisioning,
    PaymentTerms,
    PurchaseMethods,
    Sequences,
    Files,
}

impl Module {
    pub const ALL: [Module; 14] = [
        Module::Materials,
        Module::MaterialCategories,
        Module::Units,
        Module::Suppliers,
        Module::Brands,
        Module::Countries,
        Module::Warehouses,
        Module::Employees,
        Module::Users,
        Module::UserProvisioning,
        Module::PaymentTerms,
        Module::PurchaseMethods,
        Module::Sequences,
        Module::Files,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Materials => "materials",
            Module::MaterialCategories => "materialCategories",
            Module::Units => "units",
            Module::Suppliers => "suppliers",
            Module::Brands => "brands",
            Module::Countries => "countries",
            Module::Warehouses => "warehouses",
            Module::Employees => "employees",
            Module::Users => "users",
            Module::UserProvisioning => "userProvisioning",
            Module::PaymentTerms => "paymentTerms",
            Module::PurchaseMethods => "purchaseMethods",
            Module::Sequences => "sequences",
            Module::Files => "files",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}
