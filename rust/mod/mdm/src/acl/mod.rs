//! Access control: modules, actions, role table and permission profiles.
//!
//! A request's claims are resolved into a [`PermissionProfile`] exactly once
//! (see [`TokenService`]); handlers receive the profile and check against it.

mod claims;
mod module;
mod profile;
mod role;

pub use claims::{Claims, ROOT_SUBJECT, TokenService};
pub use module::{Action, Module};
pub use profile::{Overrides, PermissionProfile, RoleAssignment, build_profile};
pub use role::{Grants, RoleTable};
