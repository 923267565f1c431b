//! Admin router: `/{collection}` CRUD routes for any [`Document`].
//!
//! Every handler resolves the caller's grant once via the `Authenticator`
//! and checks `{collection}:{action}` against it before touching the store.
//! Writes run on the blocking pool: a create may wait on the code series.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use openerp_core::auth::action;
use openerp_core::{Access, Authenticator, CountResult, ListResult, ServiceError, blocking, require};
use serde_json::Value;

use crate::document::Document;
use crate::ops::DocOps;
use crate::query::ListQuery;

struct AdminState<T: Document, G> {
    ops: DocOps<T>,
    auth: Arc<dyn Authenticator<Grant = G>>,
}

impl<T: Document, G: Access + Send + 'static> AdminState<T, G> {
    fn check(&self, headers: &HeaderMap, act: &str) -> Result<(), ServiceError> {
        let grant = self.auth.resolve(headers)?;
        require(&grant, T::COLLECTION, act)
    }
}

/// Build the CRUD router for `T`.
///
/// Routes:
///   GET    /{collection}          list (`q`, `sort`, `limit`, `offset`, field filters)
///   POST   /{collection}          create
///   GET    /{collection}/@count   count matching records
///   GET    /{collection}/{id}     get by key
///   PUT    /{collection}/{id}     full replace
///   PATCH  /{collection}/{id}     RFC 7386 merge patch
///   DELETE /{collection}/{id}     delete
pub fn admin_router<T, G>(ops: DocOps<T>, auth: Arc<dyn Authenticator<Grant = G>>) -> Router
where
    T: Document,
    G: Access + Send + 'static,
{
    let state = Arc::new(AdminState { ops, auth });

    let list_path = format!("/{}", T::COLLECTION);
    let count_path = format!("/{}/@count", T::COLLECTION);
    let item_path = format!("/{}/{{id}}", T::COLLECTION);

    Router::new()
        .route(&list_path, get(list_handler::<T, G>).post(create_handler::<T, G>))
        .route(&count_path, get(count_handler::<T, G>))
        .route(
            &item_path,
            get(get_handler::<T, G>)
                .put(update_handler::<T, G>)
                .patch(patch_handler::<T, G>)
                .delete(delete_handler::<T, G>),
        )
        .with_state(state)
}

/// Decode a request body into `T`, reporting shape errors as `Validation`.
pub fn decode_body<T: Document>(body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body)
        .map_err(|e| ServiceError::Validation(format!("invalid {}: {}", T::COLLECTION, e)))
}

async fn list_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<ListResult<T>>, ServiceError> {
    state.check(&headers, action::VIEW)?;
    let query = ListQuery::from_params(params)?;
    Ok(Json(state.ops.list(&query)?))
}

async fn count_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<CountResult>, ServiceError> {
    state.check(&headers, action::VIEW)?;
    let query = ListQuery::from_params(params)?;
    let count = state.ops.count(&query)?;
    Ok(Json(CountResult { count }))
}

async fn get_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<T>, ServiceError> {
    state.check(&headers, action::VIEW)?;
    Ok(Json(state.ops.get_or_err(&id)?))
}

async fn create_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<T>, ServiceError> {
    state.check(&headers, action::CREATE)?;
    let record = decode_body::<T>(body)?;
    let created = blocking(move || state.ops.create(record)).await?;
    Ok(Json(created))
}

async fn update_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<T>, ServiceError> {
    state.check(&headers, action::UPDATE)?;
    let record = decode_body::<T>(body)?;
    let updated = blocking(move || state.ops.update(&id, record)).await?;
    Ok(Json(updated))
}

async fn patch_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Result<Json<T>, ServiceError> {
    state.check(&headers, action::UPDATE)?;
    let patched = blocking(move || state.ops.patch(&id, &patch)).await?;
    Ok(Json(patched))
}

async fn delete_handler<T: Document, G: Access + Send + 'static>(
    State(state): State<Arc<AdminState<T, G>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(), ServiceError> {
    state.check(&headers, action::DELETE)?;
    blocking(move || state.ops.delete(&id)).await
}
