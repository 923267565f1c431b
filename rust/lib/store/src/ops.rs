//! `DocOps<T>`: CRUD for a [`Document`] collection over a `KVStore`.

use std::marker::PhantomData;
use std::sync::Arc;

use openerp_core::{ListResult, ServiceError, merge_patch, now_rfc3339};
use openerp_kv::{KVError, KVStore};
use serde_json::Value;
use tracing::debug;

use crate::document::{CodeIssuer, Document};
use crate::query::ListQuery;
use crate::timestamp::{CREATED_AT, UPDATED_AT, stamp_create, stamp_update};

pub struct DocOps<T: Document> {
    kv: Arc<dyn KVStore>,
    issuer: Option<Arc<dyn CodeIssuer>>,
    _phantom: PhantomData<T>,
}

impl<T: Document> Clone for DocOps<T> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            issuer: self.issuer.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Document> DocOps<T> {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            issuer: None,
            _phantom: PhantomData,
        }
    }

    /// Fill empty keys of `T::SEQUENCE` collections from `issuer` on create.
    pub fn with_issuer(mut self, issuer: Arc<dyn CodeIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn prefix() -> String {
        format!("mdm:{}:", T::COLLECTION)
    }

    fn make_key(id: &str) -> String {
        format!("{}{}", Self::prefix(), id)
    }

    /// Get a record by key. `None` if absent.
    pub fn get(&self, id: &str) -> Result<Option<T>, ServiceError> {
        match self.get_raw(id)? {
            Some(bytes) => Ok(Some(decode_stored(id, &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_or_err(&self, id: &str) -> Result<T, ServiceError> {
        self.get(id)?
            .ok_or_else(|| ServiceError::not_found(T::COLLECTION, id))
    }

    /// Every record of the collection, sorted by key.
    pub fn all(&self) -> Result<Vec<T>, ServiceError> {
        let entries = self.kv.scan(&Self::prefix()).map_err(kv_err)?;
        entries
            .iter()
            .map(|(key, bytes)| decode_stored(key, bytes))
            .collect()
    }

    /// Scan the collection, then filter, sort and paginate in memory.
    pub fn list(&self, query: &ListQuery) -> Result<ListResult<T>, ServiceError> {
        Ok(query.apply(self.scan_with_values()?))
    }

    /// Number of records matching `query`'s filters, ignoring pagination.
    pub fn count(&self, query: &ListQuery) -> Result<usize, ServiceError> {
        Ok(self
            .scan_with_values()?
            .iter()
            .filter(|(_, v)| query.matches(v))
            .count())
    }

    /// Insert a new record.
    ///
    /// An empty key is filled from the collection's code series when an issuer
    /// is attached. The insert is atomic: a concurrent create of the same key
    /// fails with `Conflict` instead of overwriting.
    pub fn create(&self, mut record: T) -> Result<T, ServiceError> {
        record.before_create();
        self.check_unique(&record)?;

        if record.key_value().trim().is_empty() {
            if let (Some(series), Some(issuer)) = (T::SEQUENCE, &self.issuer) {
                let code = issuer.next_code(series)?;
                debug!("{}: assigned code {} from {}", T::COLLECTION, code, series);
                record.set_key(code);
            }
        }
        if record.key_value().trim().is_empty() {
            return Err(ServiceError::Validation(format!("{} is required", T::KEY_FIELD)));
        }
        record.validate()?;

        let mut value = encode(&record)?;
        stamp_create(&mut value);
        let record: T = decode_value(value.clone())?;
        let bytes = to_bytes(&value)?;

        let id = record.key_value().to_string();
        if !self
            .kv
            .compare_and_swap(&Self::make_key(&id), None, &bytes)
            .map_err(kv_err)?
        {
            return Err(ServiceError::Conflict(format!(
                "{} '{}' already exists",
                T::COLLECTION, id
            )));
        }
        debug!("{}: created {}", T::COLLECTION, id);
        Ok(record)
    }

    /// Replace the record at `id`. The body key must match `id`; an empty body
    /// key is taken from `id`. `createdAt` is kept from the stored record.
    pub fn update(&self, id: &str, mut record: T) -> Result<T, ServiceError> {
        if record.key_value().is_empty() {
            record.set_key(id.to_string());
        }
        if record.key_value() != id {
            return Err(ServiceError::Validation(format!(
                "URL key '{}' does not match body key '{}'",
                id,
                record.key_value()
            )));
        }
        let stored_bytes = self.require_raw(id)?;
        let stored: Value = serde_json::from_slice(&stored_bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", id, e)))?;

        record.keep_managed(&decode_stored(id, &stored_bytes)?);
        record.before_update();
        record.validate()?;
        self.check_unique(&record)?;
        let mut value = encode(&record)?;
        stamp_update(&mut value, &stored);
        self.replace(id, &stored_bytes, value)
    }

    /// Apply an RFC 7386 merge patch to the stored record.
    ///
    /// The key field is immutable; timestamps in the patch are ignored.
    pub fn patch(&self, id: &str, patch: &Value) -> Result<T, ServiceError> {
        if !patch.is_object() {
            return Err(ServiceError::Validation("patch must be a JSON object".into()));
        }
        if let Some(key) = patch.get(T::KEY_FIELD) {
            if key.as_str() != Some(id) {
                return Err(ServiceError::Validation(format!(
                    "{} is immutable",
                    T::KEY_FIELD
                )));
            }
        }
        let mut patch = patch.clone();
        if let Some(obj) = patch.as_object_mut() {
            obj.remove(CREATED_AT);
            obj.remove(UPDATED_AT);
        }

        let stored_bytes = self.require_raw(id)?;
        let stored: Value = serde_json::from_slice(&stored_bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", id, e)))?;
        let mut merged = stored.clone();
        merge_patch(&mut merged, &patch);

        let mut record: T = decode_value(merged)?;
        record.keep_managed(&decode_stored(id, &stored_bytes)?);
        record.before_update();
        record.validate()?;
        self.check_unique(&record)?;
        let mut value = encode(&record)?;
        stamp_update(&mut value, &stored);
        self.replace(id, &stored_bytes, value)
    }

    /// Service-side read-modify-write of the record at `id`.
    ///
    /// `change` may touch managed fields. Like `update`, the write is a CAS
    /// against the bytes read, so a concurrent change is a `Conflict`.
    pub fn modify(
        &self,
        id: &str,
        change: impl FnOnce(&mut T) -> Result<(), ServiceError>,
    ) -> Result<T, ServiceError> {
        let stored_bytes = self.require_raw(id)?;
        let stored: Value = serde_json::from_slice(&stored_bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", id, e)))?;
        let mut record: T = decode_stored(id, &stored_bytes)?;
        change(&mut record)?;
        record.set_key(id.to_string());
        record.before_update();
        record.validate()?;
        self.check_unique(&record)?;
        let mut value = encode(&record)?;
        stamp_update(&mut value, &stored);
        self.replace(id, &stored_bytes, value)
    }

    /// Unconditional write of an existing or new record, stamping `updatedAt`.
    /// For service-internal updates that already hold a fresh copy.
    pub fn save(&self, record: &T) -> Result<T, ServiceError> {
        let id = record.key_value().to_string();
        let mut value = encode(record)?;
        match self.get_raw(&id)? {
            Some(bytes) => {
                let stored: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", id, e)))?;
                stamp_update(&mut value, &stored);
            }
            None => stamp_create(&mut value),
        }
        let saved: T = decode_value(value.clone())?;
        self.kv.set(&Self::make_key(&id), &to_bytes(&value)?).map_err(kv_err)?;
        Ok(saved)
    }

    /// Write several records in one transaction, stamping `updatedAt` on each.
    pub fn save_all(&self, records: &[T]) -> Result<(), ServiceError> {
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            let mut value = encode(record)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    UPDATED_AT.into(),
                    Value::String(now_rfc3339()),
                );
            }
            encoded.push((Self::make_key(record.key_value()), to_bytes(&value)?));
        }
        let entries: Vec<(&str, &[u8])> = encoded
            .iter()
            .map(|(key, bytes)| (key.as_str(), bytes.as_slice()))
            .collect();
        self.kv.batch_set(&entries).map_err(kv_err)
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.require_raw(id)?;
        self.kv.delete(&Self::make_key(id)).map_err(kv_err)?;
        debug!("{}: deleted {}", T::COLLECTION, id);
        Ok(())
    }

    /// Whether the record lives in the read-only file layer.
    pub fn is_readonly(&self, id: &str) -> bool {
        self.kv.is_readonly(&Self::make_key(id))
    }

    // Scan-based, so two concurrent writes can still both pass.
    fn check_unique(&self, record: &T) -> Result<(), ServiceError> {
        if T::UNIQUE.is_empty() {
            return Ok(());
        }
        let value = encode(record)?;
        let taken: Vec<(&str, &Value)> = T::UNIQUE
            .iter()
            .filter_map(|field| value.get(*field).map(|v| (*field, v)))
            .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
            .collect();
        if taken.is_empty() {
            return Ok(());
        }
        for (other, other_value) in self.scan_with_values()? {
            if other.key_value() == record.key_value() {
                continue;
            }
            if let Some((field, v)) = taken.iter().find(|(f, v)| other_value.get(*f) == Some(*v)) {
                return Err(ServiceError::Conflict(format!(
                    "{} '{}' already has {} {}",
                    T::COLLECTION,
                    other.key_value(),
                    field,
                    v
                )));
            }
        }
        Ok(())
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        self.kv.get(&Self::make_key(id)).map_err(kv_err)
    }

    fn require_raw(&self, id: &str) -> Result<Vec<u8>, ServiceError> {
        self.get_raw(id)?
            .ok_or_else(|| ServiceError::not_found(T::COLLECTION, id))
    }

    // Swap in `value` only if the record still holds the bytes we read.
    fn replace(&self, id: &str, stored: &[u8], value: Value) -> Result<T, ServiceError> {
        let record: T = decode_value(value.clone())?;
        let bytes = to_bytes(&value)?;
        if !self
            .kv
            .compare_and_swap(&Self::make_key(id), Some(stored), &bytes)
            .map_err(kv_err)?
        {
            return Err(ServiceError::Conflict(format!(
                "{} '{}' was modified concurrently",
                T::COLLECTION, id
            )));
        }
        debug!("{}: updated {}", T::COLLECTION, id);
        Ok(record)
    }

    fn scan_with_values(&self) -> Result<Vec<(T, Value)>, ServiceError> {
        let entries = self.kv.scan(&Self::prefix()).map_err(kv_err)?;
        let mut out = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e)))?;
            let record: T = serde_json::from_value(value.clone())
                .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e)))?;
            out.push((record, value));
        }
        Ok(out)
    }
}

/// Map a KV error onto the HTTP-facing taxonomy.
pub fn kv_err(e: KVError) -> ServiceError {
    match e {
        KVError::ReadOnly(key) => ServiceError::ReadOnly(format!("'{}' is read-only", key)),
        other => ServiceError::Storage(other.to_string()),
    }
}

fn decode_stored<T: Document>(key: &str, bytes: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e)))
}

fn decode_value<T: Document>(value: Value) -> Result<T, ServiceError> {
    serde_json::from_value(value)
        .map_err(|e| ServiceError::Validation(format!("invalid {}: {}", T::COLLECTION, e)))
}

fn encode<T: Document>(record: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(record).map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))
}

fn to_bytes(value: &Value) -> Result<Vec<u8>, ServiceError> {
    serde_json::to_vec(value).map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase", default)]
    struct Part {
        code: String,
        name: String,
        qty: u32,
        created_at: String,
        updated_at: String,
    }

    impl Document for Part {
        const COLLECTION: &'static str = "parts";
        const SEQUENCE: Option<&'static str> = Some("PART");

        fn key_value(&self) -> &str {
            &self.code
        }

        fn set_key(&mut self, key: String) {
            self.code = key;
        }

        fn before_create(&mut self) {
            self.name = self.name.trim().to_string();
        }

        fn validate(&self) -> Result<(), ServiceError> {
            crate::document::require_field("name", &self.name)
        }
    }

    struct Counter(AtomicU64);

    impl CodeIssuer for Counter {
        fn next_code(&self, series: &str) -> Result<String, ServiceError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}-{:03}", series, n))
        }
    }

    fn part(code: &str, name: &str) -> Part {
        Part {
            code: code.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn make_ops() -> (DocOps<Part>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KVStore> =
            Arc::new(openerp_kv::RedbStore::open(&dir.path().join("test.redb")).unwrap());
        let ops = DocOps::new(kv).with_issuer(Arc::new(Counter(AtomicU64::new(1))));
        (ops, dir)
    }

    #[test]
    fn crud_lifecycle() {
        let (ops, _dir) = make_ops();

        let created = ops.create(part("", "  Bolt ")).unwrap();
        assert_eq!(created.code, "PART-001");
        assert_eq!(created.name, "Bolt");
        assert!(!created.created_at.is_empty());
        assert_eq!(created.created_at, created.updated_at);

        let fetched = ops.get_or_err("PART-001").unwrap();
        assert_eq!(fetched, created);

        let mut changed = fetched.clone();
        changed.qty = 7;
        changed.created_at = "tampered".into();
        let updated = ops.update("PART-001", changed).unwrap();
        assert_eq!(updated.qty, 7);
        assert_eq!(updated.created_at, created.created_at);

        ops.delete("PART-001").unwrap();
        assert!(ops.get("PART-001").unwrap().is_none());
        assert!(matches!(ops.delete("PART-001"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn explicit_key_is_kept_and_duplicates_conflict() {
        let (ops, _dir) = make_ops();
        assert_eq!(ops.create(part("X1", "A")).unwrap().code, "X1");
        let err = ops.create(part("X1", "B")).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(ops.get_or_err("X1").unwrap().name, "A");
    }

    #[test]
    fn empty_key_without_issuer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KVStore> =
            Arc::new(openerp_kv::RedbStore::open(&dir.path().join("t.redb")).unwrap());
        let ops = DocOps::<Part>::new(kv);
        let err = ops.create(part("", "A")).unwrap_err();
        assert_eq!(err.to_string(), "code is required");
    }

    #[test]
    fn validation_runs_on_create_and_patch() {
        let (ops, _dir) = make_ops();
        assert!(matches!(ops.create(part("X", " ")), Err(ServiceError::Validation(_))));

        ops.create(part("X", "A")).unwrap();
        let err = ops.patch("X", &json!({"name": ""})).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(ops.get_or_err("X").unwrap().name, "A");
    }

    #[test]
    fn patch_merges_and_protects_key() {
        let (ops, _dir) = make_ops();
        let created = ops.create(part("X", "A")).unwrap();

        let patched = ops
            .patch("X", &json!({"qty": 3, "createdAt": "1999-01-01T00:00:00Z"}))
            .unwrap();
        assert_eq!(patched.qty, 3);
        assert_eq!(patched.name, "A");
        assert_eq!(patched.created_at, created.created_at);

        let err = ops.patch("X", &json!({"code": "Y"})).unwrap_err();
        assert_eq!(err.to_string(), "code is immutable");

        // Repeating the current key is fine.
        assert!(ops.patch("X", &json!({"code": "X"})).is_ok());
    }

    #[test]
    fn modify_rewrites_stored_record() {
        let (ops, _dir) = make_ops();
        ops.create(part("X", "A")).unwrap();
        let changed = ops
            .modify("X", |p| {
                p.qty = 3;
                p.code = "Y".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(changed.code, "X");
        assert_eq!(changed.qty, 3);

        let err = ops
            .modify("X", |_| Err(ServiceError::Conflict("stop".into())))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(ops.get_or_err("X").unwrap().qty, 3);
        assert!(matches!(ops.modify("nope", |_| Ok(())), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn update_rejects_mismatched_key() {
        let (ops, _dir) = make_ops();
        ops.create(part("X", "A")).unwrap();
        let err = ops.update("X", part("Y", "B")).unwrap_err();
        assert!(err.to_string().contains("does not match"));
        assert!(matches!(ops.update("Z", part("Z", "B")), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn list_and_count_use_query() {
        let (ops, _dir) = make_ops();
        for name in ["Bolt", "Nut", "Bolt cap"] {
            ops.create(part("", name)).unwrap();
        }
        let mut q = ListQuery::default();
        q.q = Some("bolt".into());
        assert_eq!(ops.count(&q).unwrap(), 2);

        q.limit = 1;
        let page = ops.list(&q).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].code, "PART-001");
        assert!(page.has_more);

        assert_eq!(ops.all().unwrap().len(), 3);
    }

    #[test]
    fn readonly_records_reject_writes() {
        let dir = tempfile::tempdir().unwrap();
        let overlay =
            openerp_kv::OverlayKV::new(openerp_kv::RedbStore::open(&dir.path().join("ro.redb")).unwrap());
        overlay.insert_file_entry(
            "mdm:parts:RO".into(),
            serde_json::to_vec(&part("RO", "Shipped")).unwrap(),
        );
        let ops = DocOps::<Part>::new(Arc::new(overlay));

        assert_eq!(ops.get_or_err("RO").unwrap().name, "Shipped");
        assert!(ops.is_readonly("RO"));
        assert!(matches!(ops.create(part("RO", "x")), Err(ServiceError::ReadOnly(_))));
        assert!(matches!(ops.patch("RO", &json!({"qty": 1})), Err(ServiceError::ReadOnly(_))));
        assert!(matches!(ops.delete("RO"), Err(ServiceError::ReadOnly(_))));
    }

    #[test]
    fn save_all_is_one_batch() {
        let (ops, _dir) = make_ops();
        let a = ops.create(part("A", "a")).unwrap();
        let b = ops.create(part("B", "b")).unwrap();
        let mut batch = vec![a, b];
        for p in &mut batch {
            p.qty = 9;
        }
        ops.save_all(&batch).unwrap();
        assert!(ops.all().unwrap().iter().all(|p| p.qty == 9));
    }
}
