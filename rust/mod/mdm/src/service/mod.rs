//! Business services of the master-data module.

mod files;
pub mod provisioning;
mod sequence;
pub mod session;

use std::sync::Arc;

use openerp_blob::BlobStore;
use openerp_kv::KVStore;
use openerp_store::{DocOps, Document};

pub use files::{FileService, Upload, guess_mime, sanitize_file_name};
pub use sequence::{
    IssuedCode, MAX_PADDING, RetryPolicy, SequenceError, SequenceIssuer, default_sequences,
    format_code, zero_pad,
};

use crate::acl::TokenService;

/// Tunables of the module.
#[derive(Debug, Clone)]
pub struct MdmConfig {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for MdmConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Shared state behind every handler.
pub struct MdmService {
    kv: Arc<dyn KVStore>,
    pub issuer: Arc<SequenceIssuer>,
    pub files: FileService,
    pub tokens: Arc<TokenService>,
}

impl MdmService {
    pub fn new(
        kv: Arc<dyn KVStore>,
        blob: Arc<dyn BlobStore>,
        tokens: Arc<TokenService>,
        config: MdmConfig,
    ) -> Self {
        Self {
            issuer: Arc::new(SequenceIssuer::new(kv.clone())),
            files: FileService::new(kv.clone(), blob, config.max_upload_bytes),
            kv,
            tokens,
        }
    }

    /// CRUD operations for `T`, wired to the sequence issuer.
    pub fn ops<T: Document>(&self) -> DocOps<T> {
        DocOps::new(self.kv.clone()).with_issuer(self.issuer.clone())
    }
}
