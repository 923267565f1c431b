//! Signed identity tokens and their resolution into permission profiles.

use std::sync::Arc;

use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use openerp_core::{Authenticator, ServiceError, bearer_token};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::profile::{Overrides, PermissionProfile, RoleAssignment, build_profile};
use super::role::RoleTable;
use crate::model::User;

pub const ROOT_SUBJECT: &str = "root";

/// JWT payload: the identity's claims bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User.code, or `root`.
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignments: Vec<RoleAssignment>,
    #[serde(default)]
    pub overrides: Overrides,
    /// Role the console is currently acting as. Narrows the profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_role: Option<String>,
    /// Department the console is currently acting in. Narrows the profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_department: Option<String>,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
}

impl Claims {
    pub fn root() -> Self {
        Self {
            sub: ROOT_SUBJECT.to_string(),
            name: "Root".to_string(),
            assignments: Vec::new(),
            overrides: Overrides::new(),
            active_role: None,
            active_department: None,
            root: true,
            iat: 0,
            exp: 0,
        }
    }

    /// Claims carrying the user's current assignments and overrides.
    pub fn for_user(user: &User) -> Self {
        Self {
            sub: user.code.clone(),
            name: user.display_name.clone(),
            assignments: user.assignments.clone(),
            overrides: user.overrides.clone(),
            active_role: None,
            active_department: None,
            root: false,
            iat: 0,
            exp: 0,
        }
    }
}

/// Issues and verifies HS256 tokens, and resolves claims into profiles
/// against the role table.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expire_secs: u64,
    roles: Arc<RoleTable>,
}

impl TokenService {
    pub fn new(secret: &str, expire_secs: u64, roles: Arc<RoleTable>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            expire_secs,
            roles,
        }
    }

    pub fn expire_secs(&self) -> u64 {
        self.expire_secs
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Stamp `iat`/`exp` on `claims` and sign them.
    pub fn sign(&self, mut claims: Claims) -> Result<(String, Claims), ServiceError> {
        let now = chrono::Utc::now().timestamp();
        claims.iat = now;
        claims.exp = now.saturating_add(i64::try_from(self.expire_secs).unwrap_or(i64::MAX));
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!("TokenService: failed to encode JWT: {}", e);
            ServiceError::Internal("failed to issue token".into())
        })?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))
    }

    /// Claims of the request's bearer token.
    pub fn claims(&self, headers: &HeaderMap) -> Result<Claims, ServiceError> {
        let token = bearer_token(headers)
            .ok_or_else(|| ServiceError::Unauthorized("missing authorization token".into()))?;
        self.verify(token)
    }

    /// Root gets the full profile; everyone else gets the union of their
    /// filtered assignments with overrides applied on top.
    pub fn profile(&self, claims: &Claims) -> PermissionProfile {
        if claims.root {
            return PermissionProfile::full();
        }
        let mut profile = build_profile(
            &self.roles,
            &claims.assignments,
            claims.active_role.as_deref(),
            claims.active_department.as_deref(),
        );
        profile.apply_overrides(&claims.overrides);
        profile
    }
}

impl Authenticator for TokenService {
    type Grant = PermissionProfile;

    fn resolve(&self, headers: &HeaderMap) -> Result<PermissionProfile, ServiceError> {
        let claims = self.claims(headers)?;
        Ok(self.profile(&claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{Action, Module};
    use axum::http::header::AUTHORIZATION;
    use std::collections::BTreeSet;

    fn service() -> TokenService {
        TokenService::new("test-secret", 3600, Arc::new(RoleTable::builtin()))
    }

    fn headers(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        h
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let svc = service();
        let mut claims = Claims::root();
        claims.name = "Ops".into();
        let (token, signed) = svc.sign(claims).unwrap();
        assert_eq!(signed.exp - signed.iat, 3600);
        assert_eq!(svc.verify(&token).unwrap(), signed);
    }

    #[test]
    fn wrong_secret_and_missing_header_are_unauthorized() {
        let (token, _) = service().sign(Claims::root()).unwrap();
        let other = TokenService::new("other", 3600, Arc::new(RoleTable::builtin()));
        assert!(matches!(other.verify(&token), Err(ServiceError::Unauthorized(_))));
        assert!(matches!(
            service().resolve(&HeaderMap::new()),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let mut claims = Claims::root();
        let now = chrono::Utc::now().timestamp();
        claims.iat = now - 7200;
        claims.exp = now - 3600;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(svc.verify(&token), Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn root_resolves_to_full_profile() {
        let svc = service();
        let (token, _) = svc.sign(Claims::root()).unwrap();
        assert_eq!(svc.resolve(&headers(&token)).unwrap(), PermissionProfile::full());
    }

    #[test]
    fn active_role_and_overrides_shape_the_profile() {
        let svc = service();
        let user = User {
            code: "U00001".into(),
            email: "amy@example.com".into(),
            display_name: "Amy".into(),
            assignments: vec![RoleAssignment::new("purchasing"), RoleAssignment::new("hr")],
            overrides: Overrides::from([(Module::Files, BTreeSet::from([Action::View]))]),
            ..Default::default()
        };
        let mut claims = Claims::for_user(&user);
        claims.active_role = Some("hr".into());

        let profile = svc.profile(&claims);
        assert!(profile.can(Module::Employees, Action::Create));
        assert!(!profile.can(Module::Suppliers, Action::View));
        assert_eq!(profile.actions(Module::Files), &BTreeSet::from([Action::View]));
    }
}
