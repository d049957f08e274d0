//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Error returned by API handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    ServiceUnavailable(String),
    /// A platform tool is missing; the body carries its install command.
    MissingDependency {
        message: String,
        install_command: String,
    },
    Internal(vox_core::Error),
}

impl From<vox_core::Error> for ApiError {
    fn from(err: vox_core::Error) -> Self {
        use vox_core::Error;

        match err {
            Error::InvalidInput(_) | Error::UnsupportedFormat(_) => {
                ApiError::BadRequest(err.to_string())
            }
            Error::PayloadTooLarge(_) => ApiError::PayloadTooLarge(err.to_string()),
            Error::NotFound(_) => ApiError::NotFound(err.to_string()),
            Error::JobNotFound(_) => ApiError::NotFound("Job not found".to_string()),
            Error::InvalidState(msg) => ApiError::Conflict(msg),
            Error::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            Error::MissingDependency {
                tool,
                install_command,
            } => ApiError::MissingDependency {
                message: format!("{tool} is required for this platform but is not installed"),
                install_command,
            },
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": msg }))
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": msg }))
            }
            ApiError::MissingDependency {
                message,
                install_command,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": message, "install_command": install_command }),
            ),
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
