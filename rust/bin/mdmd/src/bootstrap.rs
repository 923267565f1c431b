//! First-start checks and root password verification.

use argon2::Argon2;
use password_hash::{PasswordHash, PasswordVerifier};

use crate::config::ServerConfig;

/// Refuse to start on a config that cannot authenticate anyone.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.root.password_hash.is_empty() {
        anyhow::bail!("no root password hash in configuration ([root] password_hash)");
    }
    if PasswordHash::new(&config.root.password_hash).is_err() {
        anyhow::bail!("root password hash is not a valid PHC string");
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("storage data_dir is empty in configuration");
    }
    Ok(())
}

/// Check a root login attempt against the configured argon2id hash.
pub fn verify_root_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
