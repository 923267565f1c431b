use std::path::PathBuf;

/// Storage layout shared by service binaries.
///
/// Only `data_dir` is usually set; every other path falls back to a fixed
/// name inside it.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root data directory. Read-only configuration (`roles/`, `reference/`)
    /// is loaded from here into the KV file layer.
    pub data_dir: Option<PathBuf>,

    /// redb database file. Defaults to `{data_dir}/data.redb`.
    pub db_path: Option<PathBuf>,

    /// Blob storage root. Defaults to `{data_dir}/blobs/`.
    pub blob_dir: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_path: None,
            blob_dir: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.redb"))
    }

    pub fn resolve_blob_dir(&self) -> PathBuf {
        self.blob_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("blobs"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}
