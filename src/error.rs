//! Error types shared across the crate boundaries.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure to mint a signed URL for a stored object.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("storage backend is not configured")]
    NotConfigured,

    #[error("signed URL lifetime must be positive")]
    InvalidTtl,

    #[error("storage responded with HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("storage transport error: {0}")]
    Transport(String),

    #[error("malformed storage response: {0}")]
    Malformed(String),

    #[error("signing task failed: {0}")]
    Join(String),
}

/// Rejection from the media element or the host platform
/// (autoplay policy, unsupported fullscreen or picture-in-picture, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not supported: {0}")]
    Unsupported(String),
}

/// Failure while querying the upstream video search API.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("upstream responded with HTTP {status}")]
    Status { status: u16, body: String },

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// Error returned by the watch API handlers, rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("sign in required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
