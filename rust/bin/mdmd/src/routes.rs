//! Route assembly: system endpoints, root login and module routers.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use mdm::acl::TokenService;
use openerp_core::ServiceModule;
use serde_json::{Value, json};
use tracing::info;

use crate::config::ServerConfig;
use crate::login;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub config: Arc<ServerConfig>,
}

/// `/health`, `/version` and `/auth/login`.
pub fn system_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(login::routes().with_state(state))
}

pub fn build_router(state: AppState, modules: &[&dyn ServiceModule]) -> Router {
    let mut app = system_router(state);
    for module in modules {
        info!("mounting module {}", module.name());
        app = app.merge(module.routes());
    }
    app
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": "mdmd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
