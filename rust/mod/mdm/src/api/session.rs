use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use openerp_core::ServiceError;

use super::AppState;
use crate::service::session::{self, SessionInfo, TokenResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session/me", get(me))
        .route("/session/refresh", post(refresh))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>, ServiceError> {
    let claims = state.tokens.claims(&headers)?;
    Ok(Json(session::me(&state.tokens, claims)))
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ServiceError> {
    let claims = state.tokens.claims(&headers)?;
    Ok(Json(session::refresh(&state.tokens, &state.ops(), claims)?))
}
