use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use openerp_core::{ListResult, ServiceError, blocking};
use serde_json::Value;

use super::{AppState, authorize};
use crate::acl::{Action, Module};
use crate::model::{SequenceDefinition, SequencePatch};
use crate::service::IssuedCode;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sequences", get(list).post(define))
        .route("/sequences/{key}", get(get_one).patch(update))
        .route("/sequences/{key}/@preview", get(preview))
        .route("/sequences/{key}/@issue", post(issue))
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResult<SequenceDefinition>>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::View)?;
    let items = state.issuer.list()?;
    Ok(Json(ListResult {
        total: items.len(),
        items,
        has_more: false,
    }))
}

async fn define(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<SequenceDefinition>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::Create)?;
    let def: SequenceDefinition = serde_json::from_value(body)
        .map_err(|e| ServiceError::Validation(format!("invalid sequence: {}", e)))?;
    let defined = blocking(move || Ok(state.issuer.define(def)?)).await?;
    Ok(Json(defined))
}

async fn get_one(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SequenceDefinition>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::View)?;
    Ok(Json(state.issuer.get(&key)?))
}

async fn update(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<SequenceDefinition>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::Update)?;
    let patch: SequencePatch = serde_json::from_value(body)
        .map_err(|e| ServiceError::Validation(format!("invalid sequence patch: {}", e)))?;
    let updated = blocking(move || Ok(state.issuer.update(&key, &patch)?)).await?;
    Ok(Json(updated))
}

async fn preview(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IssuedCode>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::View)?;
    Ok(Json(state.issuer.preview(&key)?))
}

/// Consumes a number, so it needs `update`. Runs on the blocking pool since
/// a contended counter backs off between attempts.
async fn issue(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IssuedCode>, ServiceError> {
    authorize(&state, &headers, Module::Sequences, Action::Update)?;
    let issued = blocking(move || Ok(state.issuer.issue(&key)?)).await?;
    Ok(Json(issued))
}
