use crate::error::BlobError;

/// Storage for uploaded file content.
///
/// Keys are relative, slash-separated paths such as
/// `materials/PS-00001/1718000000000-drawing.pdf`. Record metadata lives in
/// the KV store; only the bytes live here.
pub trait BlobStore: Send + Sync {
    /// Store a blob, overwriting any existing one at `key`.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Blob content, or `None` if nothing is stored at `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if absent.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    fn exists(&self, key: &str) -> Result<bool, BlobError>;
}
