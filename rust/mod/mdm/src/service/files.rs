//! File attachments: bytes in the blob store, metadata in `files`.

use std::sync::Arc;

use openerp_blob::{BlobError, BlobStore};
use openerp_core::{ServiceError, new_id, now_rfc3339};
use openerp_kv::KVStore;
use openerp_store::DocOps;
use tracing::{debug, info, warn};

use crate::model::FileAttachment;

/// Everything about an upload except its bytes.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub module: String,
    pub entity_id: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub tags: Vec<String>,
    pub is_primary: bool,
    pub uploaded_by: Option<String>,
}

pub struct FileService {
    ops: DocOps<FileAttachment>,
    blob: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl FileService {
    pub fn new(kv: Arc<dyn KVStore>, blob: Arc<dyn BlobStore>, max_bytes: usize) -> Self {
        Self {
            ops: DocOps::new(kv),
            blob,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store `bytes` and record them against `(module, entityId)`.
    ///
    /// The blob is written first; if the record cannot be saved it is
    /// removed again. A primary upload clears the flag on the entity's other
    /// files in the same batch as the new record.
    pub fn upload(&self, upload: Upload, bytes: &[u8]) -> Result<FileAttachment, ServiceError> {
        let module = check_segment("module", &upload.module)?;
        let entity_id = check_segment("entityId", &upload.entity_id)?;
        let file_name = sanitize_file_name(&upload.file_name);
        if file_name.is_empty() {
            return Err(ServiceError::Validation("fileName is required".into()));
        }
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::Validation(format!(
                "file is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let mime_type = upload
            .mime_type
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| guess_mime(&file_name));
        // The record id keeps same-name uploads in one millisecond apart.
        let id = new_id();
        let storage_path = format!(
            "{}/{}/{}-{}-{}",
            module,
            entity_id,
            chrono::Utc::now().timestamp_millis(),
            id,
            file_name
        );
        let now = now_rfc3339();
        let record = FileAttachment {
            id,
            module,
            entity_id,
            file_name,
            storage_path,
            mime_type,
            size: bytes.len() as u64,
            tags: upload
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            is_primary: upload.is_primary,
            uploaded_by: upload.uploaded_by,
            created_at: now.clone(),
            updated_at: now,
        };
        record.check()?;

        self.blob.put(&record.storage_path, bytes).map_err(blob_err)?;
        if let Err(e) = self.write_with_primary(&record) {
            if let Err(cleanup) = self.blob.delete(&record.storage_path) {
                warn!(
                    "FileService: failed to remove orphaned blob {}: {}",
                    record.storage_path, cleanup
                );
            }
            return Err(e);
        }
        info!(
            "FileService: stored {} ({} bytes) for {}/{}",
            record.file_name, record.size, record.module, record.entity_id
        );
        Ok(record)
    }

    /// Files of one entity, primary first, then oldest first.
    pub fn list(&self, module: &str, entity_id: &str) -> Result<Vec<FileAttachment>, ServiceError> {
        let mut files = self.entity_files(module.trim(), entity_id.trim())?;
        files.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(files)
    }

    pub fn get(&self, id: &str) -> Result<FileAttachment, ServiceError> {
        self.ops.get_or_err(id)
    }

    /// Metadata and bytes of a file.
    pub fn content(&self, id: &str) -> Result<(FileAttachment, Vec<u8>), ServiceError> {
        let record = self.ops.get_or_err(id)?;
        let bytes = self
            .blob
            .get(&record.storage_path)
            .map_err(blob_err)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("content of file '{}' is missing", id))
            })?;
        Ok((record, bytes))
    }

    /// Remove the record, then the blob. Another file is not promoted when
    /// the primary is deleted.
    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let record = self.ops.get_or_err(id)?;
        self.ops.delete(id)?;
        if let Err(e) = self.blob.delete(&record.storage_path) {
            warn!("FileService: record {} deleted but blob remains: {}", id, e);
        }
        debug!("FileService: deleted {}", id);
        Ok(())
    }

    /// Make `id` the entity's only primary file.
    pub fn set_primary(&self, id: &str) -> Result<FileAttachment, ServiceError> {
        let mut record = self.ops.get_or_err(id)?;
        record.is_primary = true;
        self.write_with_primary(&record)?;
        self.ops.get_or_err(id)
    }

    /// Write `record` together with any sibling whose primary flag it clears.
    fn write_with_primary(&self, record: &FileAttachment) -> Result<(), ServiceError> {
        let mut batch = vec![record.clone()];
        if record.is_primary {
            for mut other in self.entity_files(&record.module, &record.entity_id)? {
                if other.id != record.id && other.is_primary {
                    other.is_primary = false;
                    batch.push(other);
                }
            }
        }
        self.ops.save_all(&batch)
    }

    fn entity_files(&self, module: &str, entity_id: &str) -> Result<Vec<FileAttachment>, ServiceError> {
        Ok(self
            .ops
            .all()?
            .into_iter()
            .filter(|f| f.module == module && f.entity_id == entity_id)
            .collect())
    }
}

/// Last path component of `name` with anything outside letters, digits,
/// `.`, `-` and `_` replaced by `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Mime type guessed from the file extension, `application/octet-stream`
/// when unknown.
pub fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string()
}

/// Trimmed `value`, if it is usable as one storage path segment.
fn check_segment(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() || value.contains(['/', '\\']) || value.contains("..") {
        return Err(ServiceError::Validation(format!(
            "{} must be a non-empty name without '/' or '..'",
            field
        )));
    }
    Ok(value.to_string())
}

fn blob_err(e: BlobError) -> ServiceError {
    match e {
        BlobError::InvalidKey(key) => ServiceError::Validation(format!("invalid storage path '{}'", key)),
        BlobError::Io(e) => ServiceError::Storage(e.to_string()),
    }
}
