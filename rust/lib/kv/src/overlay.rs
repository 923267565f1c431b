use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::error::KVError;
use crate::traits::KVStore;

/// Two-layer KV store.
///
/// - **File layer**: read-only entries loaded from the data directory
///   (role tables, shipped reference data). Shadows the DB layer.
/// - **DB layer**: the writable backend.
///
/// Writes touching a file-layer key fail with `KVError::ReadOnly` before
/// anything reaches the DB layer.
pub struct OverlayKV<DB: KVStore> {
    file_layer: RwLock<BTreeMap<String, Vec<u8>>>,
    db: DB,
}

impl<DB: KVStore> OverlayKV<DB> {
    pub fn new(db: DB) -> Self {
        Self {
            file_layer: RwLock::new(BTreeMap::new()),
            db,
        }
    }

    /// Add an entry to the read-only layer. Called by `FileLoader`.
    pub fn insert_file_entry(&self, key: String, value: Vec<u8>) {
        self.file_layer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn file_layer_len(&self) -> usize {
        self.files().len()
    }

    fn files(&self) -> RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.file_layer.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_writable(&self, key: &str) -> Result<(), KVError> {
        if self.is_readonly(key) {
            Err(KVError::ReadOnly(key.to_string()))
        } else {
            Ok(())
        }
    }
}

impl<DB: KVStore> KVStore for OverlayKV<DB> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        if let Some(value) = self.files().get(key) {
            return Ok(Some(value.clone()));
        }
        self.db.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.ensure_writable(key)?;
        self.db.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.ensure_writable(key)?;
        self.db.delete(key)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        for (key, _) in entries {
            self.ensure_writable(key)?;
        }
        self.db.batch_set(entries)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVError> {
        self.ensure_writable(key)?;
        self.db.compare_and_swap(key, expected, new)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let mut merged: BTreeMap<String, Vec<u8>> = self.db.scan(prefix)?.into_iter().collect();
        let files = self.files();
        let shadowing = files
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, value) in shadowing {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged.into_iter().collect())
    }

    fn is_readonly(&self, key: &str) -> bool {
        self.files().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RedbStore;

    fn overlay() -> (OverlayKV<RedbStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = RedbStore::open(&dir.path().join("overlay.redb")).unwrap();
        (OverlayKV::new(db), dir)
    }

    #[test]
    fn file_layer_shadows_db_layer() {
        let (kv, _dir) = overlay();
        kv.set("mdm:countries:TW", b"db").unwrap();
        kv.insert_file_entry("mdm:countries:TW".into(), b"file".to_vec());
        assert_eq!(kv.get("mdm:countries:TW").unwrap(), Some(b"file".to_vec()));
        assert!(kv.is_readonly("mdm:countries:TW"));
        assert_eq!(kv.file_layer_len(), 1);
    }

    #[test]
    fn writes_to_file_keys_are_rejected() {
        let (kv, _dir) = overlay();
        kv.insert_file_entry("config:role:qa".into(), b"{}".to_vec());

        assert!(matches!(kv.set("config:role:qa", b"x"), Err(KVError::ReadOnly(_))));
        assert!(matches!(kv.delete("config:role:qa"), Err(KVError::ReadOnly(_))));
        assert!(matches!(
            kv.compare_and_swap("config:role:qa", Some(b"{}"), b"x"),
            Err(KVError::ReadOnly(_))
        ));
    }

    #[test]
    fn batch_with_one_readonly_key_writes_nothing() {
        let (kv, _dir) = overlay();
        kv.insert_file_entry("ro".into(), b"1".to_vec());
        let result = kv.batch_set(&[("rw", b"1".as_slice()), ("ro", b"2".as_slice())]);
        assert!(matches!(result, Err(KVError::ReadOnly(_))));
        assert_eq!(kv.get("rw").unwrap(), None);
    }

    #[test]
    fn scan_merges_layers_sorted() {
        let (kv, _dir) = overlay();
        kv.set("mdm:units:KG", b"db-kg").unwrap();
        kv.set("mdm:units:PCS", b"db-pcs").unwrap();
        kv.insert_file_entry("mdm:units:PCS".into(), b"file-pcs".to_vec());
        kv.insert_file_entry("mdm:units:BOX".into(), b"file-box".to_vec());
        kv.insert_file_entry("mdm:warehouses:W1".into(), b"other".to_vec());

        let entries = kv.scan("mdm:units:").unwrap();
        assert_eq!(
            entries,
            vec![
                ("mdm:units:BOX".to_string(), b"file-box".to_vec()),
                ("mdm:units:KG".to_string(), b"db-kg".to_vec()),
                ("mdm:units:PCS".to_string(), b"file-pcs".to_vec()),
            ]
        );
    }
}
