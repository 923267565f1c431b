use crate::error::KVError;

/// Key-value storage with a read-only layer.
///
/// Keys are namespaced: `mdm:materials:PS-00001`, `mdm:sequences:EMPLOYEE`,
/// `config:role:purchasing`. Keys loaded from the data directory are
/// read-only; everything else is read-write.
pub trait KVStore: Send + Sync {
    /// Value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Unconditional write. `KVError::ReadOnly` for file-layer keys.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete `key`. No-op if absent. `KVError::ReadOnly` for file-layer keys.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Write several keys in one transaction: either all land or none do.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Atomically replace the value of `key` with `new` if its current value
    /// equals `expected` (`None` meaning "absent").
    ///
    /// Returns `Ok(false)` without writing when the current value differs.
    /// The comparison and the write happen in the same write transaction.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVError>;

    /// All entries whose key starts with `prefix`, sorted by key.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Whether `key` lives in the read-only layer.
    fn is_readonly(&self, key: &str) -> bool;
}
