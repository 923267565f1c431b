use serde::Serialize;

/// One page of a filtered collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    /// Number of records matching the filter before pagination.
    pub total: usize,
    pub has_more: bool,
}

/// Response body of `@count` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CountResult {
    pub count: usize,
}

/// New random id (UUIDv4, hex without dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Apply an RFC 7386 JSON merge patch to `base` in place.
///
/// `null` removes a member, objects merge recursively, anything else
/// replaces. A non-object patch replaces `base` entirely.
pub fn merge_patch(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let Some(patch_obj) = patch.as_object() else {
        *base = patch.clone();
        return;
    };
    if !base.is_object() {
        *base = serde_json::Value::Object(serde_json::Map::new());
    }
    let Some(base_obj) = base.as_object_mut() else {
        return;
    };
    for (key, value) in patch_obj {
        if value.is_null() {
            base_obj.remove(key);
        } else {
            let slot = base_obj
                .entry(key.clone())
                .or_insert(serde_json::Value::Null);
            merge_patch(slot, value);
        }
    }
}
