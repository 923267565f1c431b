//! `createdAt`/`updatedAt` stamping on serialized documents.

use serde_json::{Value, json};

pub(crate) const CREATED_AT: &str = "createdAt";
pub(crate) const UPDATED_AT: &str = "updatedAt";

/// Stamp both timestamps with the current time.
pub(crate) fn stamp_create(val: &mut Value) {
    if let Some(obj) = val.as_object_mut() {
        let now = chrono::Utc::now().to_rfc3339();
        obj.insert(CREATED_AT.into(), json!(now));
        obj.insert(UPDATED_AT.into(), json!(now));
    }
}

/// Carry `createdAt` over from the stored document and stamp a fresh `updatedAt`.
pub(crate) fn stamp_update(val: &mut Value, stored: &Value) {
    if let Some(obj) = val.as_object_mut() {
        match stored.get(CREATED_AT) {
            Some(created) => obj.insert(CREATED_AT.into(), created.clone()),
            None => obj.remove(CREATED_AT),
        };
        obj.insert(
            UPDATED_AT.into(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    }
}
