//! HTTP API of the master-data module, mounted under `/mdm/v1`.

mod files;
mod permissions;
mod provisioning;
mod sequences;
mod session;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use openerp_core::{Authenticator, ServiceError, require};
use openerp_store::{Document, admin_router};

use crate::acl::{Action, Claims, Module, PermissionProfile, TokenService};
use crate::model::*;
use crate::service::MdmService;

pub type AppState = Arc<MdmService>;

/// Build the module router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(crud::<Material>(&state))
        .merge(crud::<MaterialCategory>(&state))
        .merge(crud::<Unit>(&state))
        .merge(crud::<Supplier>(&state))
        .merge(crud::<Brand>(&state))
        .merge(crud::<Country>(&state))
        .merge(crud::<Warehouse>(&state))
        .merge(crud::<Employee>(&state))
        .merge(crud::<User>(&state))
        .merge(crud::<PaymentTerm>(&state))
        .merge(crud::<PurchaseMethod>(&state))
        .merge(crud::<UserProvisioning>(&state))
        .merge(
            Router::new()
                .merge(sequences::routes())
                .merge(files::routes(state.files.max_bytes()))
                .merge(provisioning::routes())
                .merge(permissions::routes())
                .merge(session::routes())
                .with_state(state),
        );
    Router::new().nest("/mdm/v1", api)
}

fn crud<T: Document>(state: &AppState) -> Router {
    let auth: Arc<dyn Authenticator<Grant = PermissionProfile>> = state.tokens.clone();
    admin_router(state.ops::<T>(), auth)
}

/// The authenticated caller of one request.
pub(crate) struct Caller {
    pub claims: Claims,
    pub profile: PermissionProfile,
}

impl Caller {
    /// Verify the bearer token and resolve its profile.
    pub fn resolve(tokens: &TokenService, headers: &HeaderMap) -> Result<Self, ServiceError> {
        let claims = tokens.claims(headers)?;
        let profile = tokens.profile(&claims);
        Ok(Self { claims, profile })
    }

    pub fn require(&self, module: Module, action: Action) -> Result<(), ServiceError> {
        require(&self.profile, module.as_str(), action.as_str())
    }
}

/// Resolve the caller and check one permission.
pub(crate) fn authorize(
    state: &MdmService,
    headers: &HeaderMap,
    module: Module,
    action: Action,
) -> Result<Caller, ServiceError> {
    let caller = Caller::resolve(&state.tokens, headers)?;
    caller.require(module, action)?;
    Ok(caller)
}
