pub mod auth;
pub mod config;
pub mod error;
pub mod module;
pub mod task;
pub mod types;

pub use auth::{Access, AllowAll, Authenticator, DenyAll, Unrestricted, bearer_token, require};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use module::ServiceModule;
pub use task::blocking;
pub use types::{CountResult, ListResult, merge_patch, new_id, now_rfc3339};
