//! Maps `KeepError` to an HTTP response, once, at the edge — everything
//! downstream of here (the volume manager, the workers, the client fan-out
//! protocol) stays ignorant of status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keep_types::KeepError;

/// Wraps a [`KeepError`] so it can be returned directly from an axum
/// handler via `?`.
#[derive(Debug)]
pub struct ApiError(pub KeepError);

impl ApiError {
    /// The HTTP status this error maps to, per the keepstore error table:
    /// bad locator/header -> 400, missing/invalid auth -> 401/403, absent
    /// block -> 404, digest mismatch -> 422, disabled operation -> 405,
    /// missing size -> 411, oversized block -> 413, storage-integrity
    /// failures -> 500, no room left -> 503.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            KeepError::BadRequest(_) => StatusCode::BAD_REQUEST,
            KeepError::Unauthorized => StatusCode::UNAUTHORIZED,
            KeepError::Forbidden(_) => StatusCode::FORBIDDEN,
            KeepError::NotFound(_) => StatusCode::NOT_FOUND,
            KeepError::RequestHashMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            KeepError::MethodDisabled(_) => StatusCode::METHOD_NOT_ALLOWED,
            KeepError::SizeRequired => StatusCode::LENGTH_REQUIRED,
            KeepError::TooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            KeepError::Collision(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KeepError::DiskHashError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KeepError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KeepError::Full => StatusCode::SERVICE_UNAVAILABLE,
            // Server-side handlers never return these two client-fanout-only
            // variants; map them conservatively rather than panic.
            KeepError::InsufficientReplicas { .. } => StatusCode::SERVICE_UNAVAILABLE,
            KeepError::BadChecksum(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<KeepError> for ApiError {
    fn from(err: KeepError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self.0, KeepError::Collision(_) | KeepError::DiskHashError(_)) {
            tracing::error!(error = %self.0, "storage integrity error");
        } else {
            tracing::debug!(error = %self.0, status = %status, "request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
