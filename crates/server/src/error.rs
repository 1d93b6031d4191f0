//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_maven::MavenError;
use depot_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("upload rejected: {0}")]
    ValidationFailed(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidPath(_) => "invalid_path",
            Self::ValidationFailed(_) => "validation_failed",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Upstream(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<MavenError> for ApiError {
    fn from(err: MavenError) -> Self {
        match err {
            MavenError::NotFound(key) => Self::NotFound(key),
            MavenError::InvalidMetadata(msg) => Self::ValidationFailed(msg),
            MavenError::Upstream(msg) => Self::Upstream(msg),
            MavenError::Transfer(msg) => Self::BadRequest(msg),
            MavenError::TooLarge { limit } => Self::PayloadTooLarge { limit },
            MavenError::Storage(e) => Self::Storage(e),
            MavenError::Core(e) => e.into(),
        }
    }
}

impl From<depot_core::Error> for ApiError {
    fn from(err: depot_core::Error) -> Self {
        match err {
            depot_core::Error::InvalidPath(msg) => Self::InvalidPath(msg),
            e @ (depot_core::Error::InvalidMetadata(_) | depot_core::Error::MalformedDocument(_)) => {
                Self::ValidationFailed(e.to_string())
            }
            e => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let cases = [
            (MavenError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (
                MavenError::InvalidMetadata("empty".into()),
                StatusCode::BAD_REQUEST,
            ),
            (MavenError::Upstream("502".into()), StatusCode::BAD_GATEWAY),
            (
                MavenError::TooLarge { limit: 10 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                MavenError::Storage(StorageError::NotFound("k".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                MavenError::Storage(StorageError::Io(std::io::Error::other("disk"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MavenError::Core(depot_core::Error::InvalidPath("x".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            ApiError::MethodNotAllowed("DELETE".into()).code(),
            "method_not_allowed"
        );
        assert_eq!(
            ApiError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
