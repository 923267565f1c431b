//! Server configuration file (`/etc/mdm/<name>.toml`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

const CONFIG_DIR: &str = "/etc/mdm";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub root: RootConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    /// argon2id PHC string of the root password.
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Holds `data.redb`, `blobs/`, and the read-only `roles/` and
    /// `reference/` trees.
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_expire_secs() -> u64 {
    8 * 3600
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

impl ServerConfig {
    /// A bare context name maps to `/etc/mdm/<name>.toml`; anything with a
    /// `/` or `.` is taken as a path.
    pub fn resolve_path(context: &str) -> PathBuf {
        if context.contains('/') || context.contains('.') {
            PathBuf::from(context)
        } else {
            Path::new(CONFIG_DIR).join(format!("{}.toml", context))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
