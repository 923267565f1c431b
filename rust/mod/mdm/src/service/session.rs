//! Session endpoints' logic: who am I, and re-issue my token.

use openerp_core::ServiceError;
use openerp_store::DocOps;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acl::{Claims, PermissionProfile, TokenService};
use crate::model::User;

/// Signed token handed to the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// The caller's claims and the profile they resolve to.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub claims: Claims,
    pub profile: PermissionProfile,
}

pub fn me(tokens: &TokenService, claims: Claims) -> SessionInfo {
    let profile = tokens.profile(&claims);
    SessionInfo { claims, profile }
}

/// Re-issue a token from the user's current record.
///
/// Root tokens are re-signed as they are. For users, assignments and
/// overrides are read again, so role changes apply without a new login. The
/// active role and department carry over. Missing or inactive users are
/// `Unauthorized`.
pub fn refresh(
    tokens: &TokenService,
    users: &DocOps<User>,
    claims: Claims,
) -> Result<TokenResponse, ServiceError> {
    let fresh = if claims.root {
        claims
    } else {
        let user = users
            .get(&claims.sub)?
            .filter(|u| u.active)
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("user '{}' is missing or inactive", claims.sub))
            })?;
        let mut fresh = Claims::for_user(&user);
        fresh.active_role = claims.active_role;
        fresh.active_department = claims.active_department;
        fresh
    };
    debug!("session: refreshing token for {}", fresh.sub);
    let (token, _) = tokens.sign(fresh)?;
    Ok(TokenResponse::bearer(token, tokens.expire_secs()))
}
