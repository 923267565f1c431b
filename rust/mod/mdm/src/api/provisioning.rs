use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use openerp_core::{ServiceError, blocking};

use super::{AppState, authorize};
use crate::acl::{Action, Module};
use crate::model::UserProvisioning;
use crate::service::provisioning;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/userProvisioning/{id}/@apply", post(apply))
        .route("/userProvisioning/{id}/@reject", post(reject))
}

/// Needs `userProvisioning:update` and, since it writes the account,
/// `users:create`.
async fn apply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserProvisioning>, ServiceError> {
    let caller = authorize(&state, &headers, Module::UserProvisioning, Action::Update)?;
    caller.require(Module::Users, Action::Create)?;
    let applied = blocking(move || provisioning::apply(&state.ops(), &state.ops(), &id)).await?;
    Ok(Json(applied))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserProvisioning>, ServiceError> {
    authorize(&state, &headers, Module::UserProvisioning, Action::Update)?;
    let rejected = blocking(move || provisioning::reject(&state.ops(), &id)).await?;
    Ok(Json(rejected))
}
