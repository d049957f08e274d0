//! Error types for vox.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using vox's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not found (or not visible to the calling session)
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Operation requested against a job in the wrong status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid input (malformed source, empty upload, bad URL)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Source format is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Source exceeds the configured size ceiling
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Collaborator rejected the request due to rate limiting
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Collaborator is temporarily unavailable or not configured
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An external tool needed for this source is not installed
    #[error("Missing dependency: {tool} is not installed")]
    MissingDependency {
        tool: String,
        install_command: String,
    },

    /// Collaborator rejected our credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Transcription/summarization failed for an unspecified reason
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

/// Classification of a failure, used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    TransientNetwork,
    RateLimited,
    ServiceUnavailable,
    ValidationError,
    UnsupportedFormat,
    PermanentAuthError,
}

impl ErrorClass {
    /// Whether a failure of this class may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::TransientNetwork | ErrorClass::RateLimited | ErrorClass::ServiceUnavailable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::TransientNetwork => "transient_network",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::ServiceUnavailable => "service_unavailable",
            ErrorClass::ValidationError => "validation_error",
            ErrorClass::UnsupportedFormat => "unsupported_format",
            ErrorClass::PermanentAuthError => "permanent_auth_error",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for retry decisions.
    ///
    /// Unspecified collaborator failures count as a service outage and are
    /// retried; anything describing the request itself is permanent.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Request(_) | Error::Timeout(_) | Error::Io(_) => ErrorClass::TransientNetwork,
            Error::RateLimited(_) => ErrorClass::RateLimited,
            Error::ServiceUnavailable(_)
            | Error::MissingDependency { .. }
            | Error::Inference(_)
            | Error::Serialization(_)
            | Error::Internal(_) => ErrorClass::ServiceUnavailable,
            Error::Unauthorized(_) | Error::Config(_) => ErrorClass::PermanentAuthError,
            Error::UnsupportedFormat(_) => ErrorClass::UnsupportedFormat,
            Error::NotFound(_)
            | Error::JobNotFound(_)
            | Error::InvalidState(_)
            | Error::InvalidInput(_)
            | Error::PayloadTooLarge(_) => ErrorClass::ValidationError,
        }
    }

    /// True for errors that reject a submission before any job is created.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::UnsupportedFormat(_) | Error::PayloadTooLarge(_)
        )
    }
}
