//! Request authentication seam.
//!
//! Framework code never reads session state on its own. An `Authenticator`
//! turns request headers into a grant once per request; handlers then ask
//! that grant whether `resource:action` is allowed. The concrete grant type
//! (e.g. a resolved permission profile) belongs to the business module.

use axum::http::HeaderMap;

use crate::ServiceError;

/// Standard action names used in permission checks.
pub mod action {
    pub const VIEW: &str = "view";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

/// A resolved set of permissions for one caller.
pub trait Access {
    /// Whether the caller may perform `action` on `resource` (a collection name).
    fn allows(&self, resource: &str, action: &str) -> bool;
}

/// Resolves request headers into a grant.
pub trait Authenticator: Send + Sync + 'static {
    type Grant: Access + Send + 'static;

    /// Authenticate the request. Fails with `Unauthorized` when credentials
    /// are missing or invalid.
    fn resolve(&self, headers: &HeaderMap) -> Result<Self::Grant, ServiceError>;
}

/// Fail with `PermissionDenied` unless `grant` allows `resource:action`.
pub fn require<G: Access + ?Sized>(
    grant: &G,
    resource: &str,
    action: &str,
) -> Result<(), ServiceError> {
    if grant.allows(resource, action) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(format!(
            "missing permission {}:{}",
            resource, action
        )))
    }
}

/// Grant that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl Access for Unrestricted {
    fn allows(&self, _resource: &str, _action: &str) -> bool {
        true
    }
}

/// Authenticator that lets every request through. Tests and local tooling only.
pub struct AllowAll;

impl Authenticator for AllowAll {
    type Grant = Unrestricted;

    fn resolve(&self, _headers: &HeaderMap) -> Result<Unrestricted, ServiceError> {
        Ok(Unrestricted)
    }
}

/// Authenticator that rejects every request.
pub struct DenyAll;

impl Authenticator for DenyAll {
    type Grant = Unrestricted;

    fn resolve(&self, _headers: &HeaderMap) -> Result<Unrestricted, ServiceError> {
        Err(ServiceError::Unauthorized("access denied".into()))
    }
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ViewOnly;

    impl Access for ViewOnly {
        fn allows(&self, _resource: &str, action: &str) -> bool {
            action == action::VIEW
        }
    }

    #[test]
    fn require_maps_denial_to_permission_denied() {
        assert!(require(&ViewOnly, "materials", action::VIEW).is_ok());
        let err = require(&ViewOnly, "materials", action::DELETE).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert!(err.to_string().contains("materials:delete"));
    }

    #[test]
    fn allow_all_and_deny_all() {
        let headers = HeaderMap::new();
        assert!(AllowAll.resolve(&headers).unwrap().allows("x", "y"));
        assert_eq!(DenyAll.resolve(&headers).unwrap_err().error_code(), "UNAUTHENTICATED");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
