use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, Table, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// KVStore backed by redb, an embedded pure-Rust database.
///
/// Every key is read-write. redb serialises write transactions, which is
/// what makes `compare_and_swap` atomic.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a database file at `path`.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(KVError::storage)?;
        let store = Self { db: Arc::new(db) };
        // Create the table up front so read transactions can always open it.
        store.write(|_| Ok(()))?;
        debug!("RedbStore: opened {:?}", path);
        Ok(store)
    }

    /// Run `f` inside a write transaction and commit.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> Result<R, KVError>,
    ) -> Result<R, KVError> {
        let txn = self.db.begin_write().map_err(KVError::storage)?;
        let out = {
            let mut table = txn.open_table(TABLE).map_err(KVError::storage)?;
            f(&mut table)?
        };
        txn.commit().map_err(KVError::storage)?;
        Ok(out)
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = txn.open_table(TABLE).map_err(KVError::storage)?;
        let value = table.get(key).map_err(KVError::storage)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(|table| {
            table.insert(key, value).map_err(KVError::storage)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(|table| {
            table.remove(key).map_err(KVError::storage)?;
            Ok(())
        })
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.write(|table| {
            for (key, value) in entries {
                table.insert(*key, *value).map_err(KVError::storage)?;
            }
            Ok(())
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVError> {
        let txn = self.db.begin_write().map_err(KVError::storage)?;
        let swapped = {
            let mut table = txn.open_table(TABLE).map_err(KVError::storage)?;
            let current = table
                .get(key)
                .map_err(KVError::storage)?
                .map(|v| v.value().to_vec());
            if current.as_deref() == expected {
                table.insert(key, new).map_err(KVError::storage)?;
                true
            } else {
                false
            }
        };
        if swapped {
            txn.commit().map_err(KVError::storage)?;
        } else {
            txn.abort().map_err(KVError::storage)?;
        }
        Ok(swapped)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = txn.open_table(TABLE).map_err(KVError::storage)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(KVError::storage)? {
            let (key, value) = entry.map_err(KVError::storage)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }

    fn is_readonly(&self, _key: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("kv.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn set_get_delete() {
        let (kv, _dir) = store();
        assert_eq!(kv.get("mdm:units:PCS").unwrap(), None);
        kv.set("mdm:units:PCS", b"{}").unwrap();
        assert_eq!(kv.get("mdm:units:PCS").unwrap(), Some(b"{}".to_vec()));
        kv.delete("mdm:units:PCS").unwrap();
        assert_eq!(kv.get("mdm:units:PCS").unwrap(), None);
        // Deleting again is a no-op.
        kv.delete("mdm:units:PCS").unwrap();
    }

    #[test]
    fn scan_stops_at_prefix_boundary() {
        let (kv, _dir) = store();
        kv.set("mdm:brands:B1", b"1").unwrap();
        kv.set("mdm:brands:B2", b"2").unwrap();
        kv.set("mdm:countries:TW", b"3").unwrap();
        kv.set("mdm:brand", b"x").unwrap();

        let brands = kv.scan("mdm:brands:").unwrap();
        let keys: Vec<_> = brands.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["mdm:brands:B1", "mdm:brands:B2"]);
    }

    #[test]
    fn cas_insert_if_absent() {
        let (kv, _dir) = store();
        assert!(kv.compare_and_swap("k", None, b"first").unwrap());
        assert!(!kv.compare_and_swap("k", None, b"second").unwrap());
        assert_eq!(kv.get("k").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn cas_replaces_only_expected_value() {
        let (kv, _dir) = store();
        kv.set("k", b"1").unwrap();
        assert!(!kv.compare_and_swap("k", Some(b"0"), b"2").unwrap());
        assert_eq!(kv.get("k").unwrap(), Some(b"1".to_vec()));
        assert!(kv.compare_and_swap("k", Some(b"1"), b"2").unwrap());
        assert_eq!(kv.get("k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn cas_expected_value_but_key_missing() {
        let (kv, _dir) = store();
        assert!(!kv.compare_and_swap("missing", Some(b"1"), b"2").unwrap());
        assert_eq!(kv.get("missing").unwrap(), None);
    }

    #[test]
    fn batch_set_writes_all() {
        let (kv, _dir) = store();
        kv.batch_set(&[("a", b"1".as_slice()), ("b", b"2".as_slice())]).unwrap();
        assert_eq!(kv.scan("").unwrap().len(), 2);
    }

    #[test]
    fn concurrent_cas_counter_has_no_lost_updates() {
        let (kv, _dir) = store();
        kv.set("counter", b"0").unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut done = 0;
                    while done < 25 {
                        let current = kv.get("counter").unwrap().unwrap();
                        let n: u64 = std::str::from_utf8(&current).unwrap().parse().unwrap();
                        let next = (n + 1).to_string();
                        if kv.compare_and_swap("counter", Some(&current), next.as_bytes()).unwrap() {
                            done += 1;
                        }
                    }
                });
            }
        });

        assert_eq!(kv.get("counter").unwrap(), Some(b"100".to_vec()));
    }
}
