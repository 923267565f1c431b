use std::collections::{BTreeMap, BTreeSet};

use openerp_core::Access;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::module::{Action, Module};
use super::role::RoleTable;

/// Per-module action sets carried in an identity's claims. Each entry
/// replaces the built profile's set for that module.
pub type Overrides = BTreeMap<Module, BTreeSet<Action>>;

/// One role held by an identity, optionally scoped to departments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: String,
    /// Departments the role applies in. Empty means everywhere.
    #[serde(default)]
    pub departments: Vec<String>,
    /// Default assignment for the role switcher. Does not affect grants.
    #[serde(default)]
    pub primary: bool,
}

impl RoleAssignment {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            ..Default::default()
        }
    }

    pub fn in_departments(mut self, departments: &[&str]) -> Self {
        self.departments = departments.iter().map(|d| d.to_string()).collect();
        self
    }

    pub(crate) fn normalize(&mut self) {
        self.role = self.role.trim().to_string();
        self.departments = self
            .departments
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
    }

    fn passes(&self, role_filter: Option<&str>, department_filter: Option<&str>) -> bool {
        let role_ok = role_filter.is_none_or(|r| self.role == r);
        let dept_ok = match department_filter {
            Some(d) if !self.departments.is_empty() => self.departments.iter().any(|x| x == d),
            _ => true,
        };
        role_ok && dept_ok
    }
}

/// Resolved module → allowed actions map for one identity.
///
/// Every module is always present; a module the identity cannot touch maps
/// to the empty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionProfile(BTreeMap<Module, BTreeSet<Action>>);

impl PermissionProfile {
    /// Every module with no actions.
    pub fn locked() -> Self {
        Self(Module::ALL.into_iter().map(|m| (m, BTreeSet::new())).collect())
    }

    /// Every module with every action. Used for root.
    pub fn full() -> Self {
        Self(
            Module::ALL
                .into_iter()
                .map(|m| (m, Action::ALL.into_iter().collect()))
                .collect(),
        )
    }

    pub fn actions(&self, module: Module) -> &BTreeSet<Action> {
        static EMPTY: BTreeSet<Action> = BTreeSet::new();
        self.0.get(&module).unwrap_or(&EMPTY)
    }

    pub fn can(&self, module: Module, action: Action) -> bool {
        self.actions(module).contains(&action)
    }

    /// Add `actions` to `module`'s set.
    pub fn grant(&mut self, module: Module, actions: impl IntoIterator<Item = Action>) {
        self.0.entry(module).or_default().extend(actions);
    }

    /// Replace the set of every module named in `overrides`.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        for (module, actions) in overrides {
            self.0.insert(*module, actions.clone());
        }
    }

    pub fn modules(&self) -> &BTreeMap<Module, BTreeSet<Action>> {
        &self.0
    }
}

impl Access for PermissionProfile {
    fn allows(&self, resource: &str, action: &str) -> bool {
        match (Module::parse(resource), Action::parse(action)) {
            (Some(m), Some(a)) => self.can(m, a),
            _ => false,
        }
    }
}

/// Union the grants of every assignment that passes the filters.
///
/// An assignment passes when its role equals `role_filter` (if given) and,
/// if `department_filter` is given and the assignment names departments,
/// one of them equals it. Unknown roles grant nothing. With no passing
/// assignment the result is [`PermissionProfile::locked`].
pub fn build_profile(
    table: &RoleTable,
    assignments: &[RoleAssignment],
    role_filter: Option<&str>,
    department_filter: Option<&str>,
) -> PermissionProfile {
    let mut profile = PermissionProfile::locked();
    for assignment in assignments
        .iter()
        .filter(|a| a.passes(role_filter, department_filter))
    {
        let Some(grants) = table.grants(&assignment.role) else {
            warn!("build_profile: unknown role '{}'", assignment.role);
            continue;
        };
        for (module, actions) in grants {
            profile.grant(*module, actions.iter().copied());
        }
    }
    profile
}
