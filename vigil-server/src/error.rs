//! Error types for the Vigil API server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Actor lacks the required role or ownership (403)
    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    /// Missing or invalid bearer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict (409) - e.g., duplicate scan run for a channel
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// vigil-common error
    #[error("Common error: {0}")]
    Common(#[from] vigil_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Typed common errors keep their meaning when they cross the
        // service boundary.
        let this = match self {
            ApiError::Common(common) => match common {
                vigil_common::Error::NotFound(msg) => ApiError::NotFound(msg),
                vigil_common::Error::NotPermitted(msg) => ApiError::Forbidden(msg),
                vigil_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
                other => ApiError::Internal(other.to_string()),
            },
            other => other,
        };

        let (status, error_code, message) = match this {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            // Internal failures are logged server-side with the real cause;
            // the response body stays generic so internals never leak.
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                )
            }
            ApiError::Io(err) => {
                tracing::error!(error = %err, "IO error in request handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                )
            }
            ApiError::Other(err) => {
                tracing::error!(error = %err, "Unhandled error in request handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                )
            }
            ApiError::Common(err) => {
                tracing::error!(error = %err, "Unhandled common error in request handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
