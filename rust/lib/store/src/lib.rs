//! Document persistence for master-data collections.
//!
//! A model implements [`Document`] to declare its collection, key field and
//! hooks. [`DocOps`] provides CRUD over any `KVStore`, [`ListQuery`] the
//! in-memory filtering, and [`admin_router`] the REST surface.
//!
//! ```ignore
//! impl Document for Unit {
//!     const COLLECTION: &'static str = "units";
//!     fn key_value(&self) -> &str { &self.code }
//!     fn set_key(&mut self, key: String) { self.code = key; }
//! }
//! ```

pub mod admin;
pub mod document;
pub mod ops;
pub mod query;
mod timestamp;

pub use admin::{admin_router, decode_body};
pub use document::{CodeIssuer, Document, require_field};
pub use ops::{DocOps, kv_err};
pub use query::ListQuery;
