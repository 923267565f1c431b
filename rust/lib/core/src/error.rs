use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Clients match on `code`, never on the message text.

/// Stable error code constants carried in every error body.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const READ_ONLY: &str = "READ_ONLY";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Error type shared by every module at the HTTP edge.
///
/// Module-level errors (`KVError`, `BlobError`, `SequenceError`, ...) convert
/// into this. The JSON body always has both fields:
///
/// ```json
/// {"code": "NOT_FOUND", "message": "materials 'PS-00042' not found"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key, or a write lost a race it could not win. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but the permission profile lacks the action. HTTP 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// Write to data loaded from the read-only file layer. HTTP 403.
    #[error("{0}")]
    ReadOnly(String),

    /// The backing store could not be reached or a write did not land. HTTP 503.
    #[error("{0}")]
    Unavailable(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => error_code::NOT_FOUND,
            Self::Conflict(_) => error_code::ALREADY_EXISTS,
            Self::Validation(_) => error_code::VALIDATION_FAILED,
            Self::Unauthorized(_) => error_code::UNAUTHENTICATED,
            Self::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            Self::ReadOnly(_) => error_code::READ_ONLY,
            Self::Unavailable(_) => error_code::UNAVAILABLE,
            Self::Storage(_) => error_code::STORAGE_ERROR,
            Self::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) | Self::ReadOnly(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a `NotFound` naming the collection and key.
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found", collection, key))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
