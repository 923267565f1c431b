use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use openerp_core::ServiceError;
use serde::Deserialize;

use super::{AppState, authorize};
use crate::acl::{Action, Module, Overrides, PermissionProfile, RoleAssignment, build_profile};

pub fn routes() -> Router<AppState> {
    Router::new().route("/permissions/@build", post(build))
}

/// Input of the permission-matrix preview.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildRequest {
    #[serde(default)]
    assignments: Vec<RoleAssignment>,
    #[serde(default)]
    role_filter: Option<String>,
    #[serde(default)]
    department_filter: Option<String>,
    #[serde(default)]
    overrides: Overrides,
}

async fn build(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BuildRequest>,
) -> Result<Json<PermissionProfile>, ServiceError> {
    authorize(&state, &headers, Module::Users, Action::View)?;
    let mut profile = build_profile(
        state.tokens.roles(),
        &req.assignments,
        req.role_filter.as_deref(),
        req.department_filter.as_deref(),
    );
    profile.apply_overrides(&req.overrides);
    Ok(Json(profile))
}
