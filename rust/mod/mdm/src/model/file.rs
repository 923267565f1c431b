use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

/// Metadata of an uploaded file. The bytes live in the blob store at
/// `storagePath`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    #[serde(default)]
    pub id: String,
    /// Owning collection, e.g. `materials`.
    #[serde(default)]
    pub module: String,
    /// Key of the owning record.
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub storage_path: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl FileAttachment {
    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("module", &self.module)?;
        require_field("entityId", &self.entity_id)?;
        require_field("fileName", &self.file_name)?;
        require_field("storagePath", &self.storage_path)
    }
}
