//! Root login: verifies the password against the configured argon2id hash
//! and issues a root token.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mdm::acl::{Claims, ROOT_SUBJECT};
use mdm::service::session::TokenResponse;
use openerp_core::ServiceError;
use serde::Deserialize;
use tracing::{info, warn};

use crate::bootstrap::verify_root_password;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

/// Only root signs in with a password. Console users get their tokens from
/// the identity provider and keep them current via `session/refresh`.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    if body.username != ROOT_SUBJECT {
        return Err(ServiceError::Unauthorized(
            "password login is only available for root".into(),
        ));
    }
    if !verify_root_password(&body.password, &state.config.root.password_hash) {
        warn!("login: rejected root password");
        return Err(ServiceError::Unauthorized("invalid credentials".into()));
    }
    let (token, _) = state.tokens.sign(Claims::root())?;
    info!("login: root signed in");
    Ok(Json(TokenResponse::bearer(token, state.tokens.expire_secs())))
}
