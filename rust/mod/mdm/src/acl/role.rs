//! Role → module → actions table.

use std::collections::{BTreeMap, BTreeSet};

use openerp_core::ServiceError;
use openerp_kv::KVStore;
use tracing::{debug, warn};

use super::module::{Action, Module};

/// Actions a role grants, per module.
pub type Grants = BTreeMap<Module, BTreeSet<Action>>;

const ROLE_PREFIX: &str = "config:role:";

/// Static role table. Built-in roles can be replaced, and new roles added,
/// by `roles/{name}.json` files in the data directory.
#[derive(Debug, Clone)]
pub struct RoleTable {
    roles: BTreeMap<String, Grants>,
}

impl RoleTable {
    /// The built-in roles.
    pub fn builtin() -> Self {
        use Action::*;
        use Module::*;

        const CRUD: &[Action] = &[View, Create, Update, Delete];
        const EDIT: &[Action] = &[View, Create, Update];
        const READ: &[Action] = &[View];
        const STOCK: &[Action] = &[View, Update];

        let mut roles = BTreeMap::new();
        roles.insert("admin".to_string(), grants(&Module::ALL.map(|m| (m, CRUD))));
        roles.insert(
            "viewer".to_string(),
            grants(&Module::ALL.map(|m| (m, READ))),
        );
        roles.insert(
            "purchasing".to_string(),
            grants(&[
                (Suppliers, CRUD),
                (PaymentTerms, CRUD),
                (PurchaseMethods, CRUD),
                (Materials, EDIT),
                (MaterialCategories, READ),
                (Units, READ),
                (Brands, EDIT),
                (Countries, READ),
                (Warehouses, READ),
                (Files, EDIT),
            ]),
        );
        roles.insert(
            "warehouse".to_string(),
            grants(&[
                (Warehouses, CRUD),
                (Materials, STOCK),
                (MaterialCategories, READ),
                (Units, EDIT),
                (Suppliers, READ),
                (Files, EDIT),
            ]),
        );
        roles.insert(
            "engineering".to_string(),
            grants(&[
                (Materials, CRUD),
                (MaterialCategories, CRUD),
                (Units, EDIT),
                (Brands, EDIT),
                (Suppliers, READ),
                (Countries, READ),
                (Files, CRUD),
            ]),
        );
        roles.insert(
            "hr".to_string(),
            grants(&[
                (Employees, CRUD),
                (Users, EDIT),
                (UserProvisioning, CRUD),
                (Files, EDIT),
            ]),
        );
        Self { roles }
    }

    /// Built-in roles plus `config:role:*` entries from `kv`. An entry that
    /// is not a valid grants object is skipped with a warning.
    pub fn load(kv: &dyn KVStore) -> Result<Self, ServiceError> {
        let mut table = Self::builtin();
        let entries = kv
            .scan(ROLE_PREFIX)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        for (key, bytes) in entries {
            let name = &key[ROLE_PREFIX.len()..];
            match serde_json::from_slice::<Grants>(&bytes) {
                Ok(g) => {
                    debug!("RoleTable: loaded role {} from {}", name, key);
                    table.insert(name, g);
                }
                Err(e) => warn!("RoleTable: skipping {}: {}", key, e),
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, role: &str, grants: Grants) {
        self.roles.insert(role.to_string(), grants);
    }

    pub fn grants(&self, role: &str) -> Option<&Grants> {
        self.roles.get(role)
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn grants(entries: &[(Module, &[Action])]) -> Grants {
    entries
        .iter()
        .map(|(m, actions)| (*m, actions.iter().copied().collect()))
        .collect()
}
