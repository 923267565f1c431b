use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use openerp_core::{ServiceError, blocking};

use super::{AppState, authorize};
use crate::acl::{Action, Module};
use crate::model::FileAttachment;
use crate::service::Upload;

/// Room for the body on top of the configured file limit, so oversize
/// uploads reach the service and get a proper error.
const BODY_SLACK: usize = 64 * 1024;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/files/@upload",
            post(upload).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(BODY_SLACK),
            )),
        )
        .route("/files", get(list))
        .route("/files/{id}", get(get_one).delete(delete))
        .route("/files/{id}/@content", get(content))
        .route("/files/{id}/@primary", post(set_primary))
}

fn param<'a>(params: &'a BTreeMap<String, String>, name: &str) -> Result<&'a str, ServiceError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::Validation(format!("query parameter '{}' is required", name)))
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Json<FileAttachment>, ServiceError> {
    let caller = authorize(&state, &headers, Module::Files, Action::Create)?;

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.starts_with("application/octet-stream"))
        .map(str::to_string);
    let upload = Upload {
        module: param(&params, "module")?.to_string(),
        entity_id: param(&params, "entityId")?.to_string(),
        file_name: param(&params, "fileName")?.to_string(),
        mime_type,
        tags: params
            .get("tags")
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        is_primary: params
            .get("primary")
            .is_some_and(|v| v == "true" || v == "1"),
        uploaded_by: Some(caller.claims.sub),
    };
    let stored = blocking(move || state.files.upload(upload, &body)).await?;
    Ok(Json(stored))
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<FileAttachment>>, ServiceError> {
    authorize(&state, &headers, Module::Files, Action::View)?;
    let files = state
        .files
        .list(param(&params, "module")?, param(&params, "entityId")?)?;
    Ok(Json(files))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FileAttachment>, ServiceError> {
    authorize(&state, &headers, Module::Files, Action::View)?;
    Ok(Json(state.files.get(&id)?))
}

async fn content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    authorize(&state, &headers, Module::Files, Action::View)?;
    let (record, bytes) = state.files.content(&id)?;

    let content_type = HeaderValue::from_str(&record.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    // File names are sanitised on upload, so they are header-safe.
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", record.file_name))
        .unwrap_or(HeaderValue::from_static("inline"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(), ServiceError> {
    authorize(&state, &headers, Module::Files, Action::Delete)?;
    state.files.delete(&id)
}

async fn set_primary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FileAttachment>, ServiceError> {
    authorize(&state, &headers, Module::Files, Action::Update)?;
    Ok(Json(state.files.set_primary(&id)?))
}
