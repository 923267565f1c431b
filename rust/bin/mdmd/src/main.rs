//! `mdmd`: the master-data administration server.
//!
//! Usage:
//!   mdmd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/mdm/<name>.toml`. A value containing
//! `/` or `.` is used as a path directly.

mod bootstrap;
mod config;
mod login;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mdm::MdmModule;
use mdm::acl::{RoleTable, TokenService};
use mdm::service::{MdmConfig, MdmService};
use openerp_blob::FileStore;
use openerp_core::ServiceConfig;
use openerp_kv::{FileLoader, KVStore, OverlayKV, RedbStore};
use tracing::info;

use config::ServerConfig;
use routes::AppState;

#[derive(Parser, Debug)]
#[command(name = "mdmd", about = "Master-data administration server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let data_dir = PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let core_config = ServiceConfig {
        data_dir: Some(data_dir.clone()),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Writable redb layer with the data directory's roles and reference
    // records on top as a read-only layer.
    let db = RedbStore::open(&core_config.resolve_db_path())
        .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?;
    let overlay = OverlayKV::new(db);
    let loaded = FileLoader::load(&data_dir, &overlay)
        .map_err(|e| anyhow::anyhow!("failed to load data directory: {}", e))?;
    info!("Loaded {} read-only entries from {}", loaded, data_dir.display());
    let kv: Arc<dyn KVStore> = Arc::new(overlay);

    let blob = Arc::new(
        FileStore::open(&core_config.resolve_blob_dir())
            .map_err(|e| anyhow::anyhow!("failed to open blob store: {}", e))?,
    );

    let roles = RoleTable::load(kv.as_ref())?;
    info!("Roles: {}", roles.role_names().collect::<Vec<_>>().join(", "));
    let tokens = Arc::new(TokenService::new(
        &server_config.jwt.secret,
        server_config.jwt.expire_secs,
        Arc::new(roles),
    ));

    let mdm_module = MdmModule::new(MdmService::new(
        kv,
        blob,
        tokens.clone(),
        MdmConfig {
            max_upload_bytes: server_config.upload.max_bytes,
        },
    ));
    mdm_module.seed()?;
    info!("MDM module initialized");

    let state = AppState {
        tokens,
        config: Arc::new(server_config),
    };
    let app = routes::build_router(state, &[&mdm_module]);

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("mdmd listening on {}", core_config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("mdmd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
