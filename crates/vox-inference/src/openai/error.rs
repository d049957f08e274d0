//! OpenAI-specific error handling.

use vox_core::Error;

use super::types::OpenAIErrorResponse;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Uploaded media is not a format the endpoint accepts.
    UnsupportedMedia,
    /// Malformed request.
    InvalidRequest,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401 | 403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (415, _) => Self::UnsupportedMedia,
            (400, _) if error_type.contains("invalid_file") => Self::UnsupportedMedia,
            (400 | 413 | 422, _) => Self::InvalidRequest,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert an OpenAI error to a vox Error carrying the right retry class.
pub fn to_vox_error(code: OpenAIErrorCode, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Unauthorized(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::RateLimitExceeded => Error::RateLimited(message.to_string()),
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => {
            Error::InvalidInput(format!("Context too long: {}", message))
        }
        OpenAIErrorCode::UnsupportedMedia => Error::UnsupportedFormat(message.to_string()),
        OpenAIErrorCode::InvalidRequest => Error::InvalidInput(message.to_string()),
        OpenAIErrorCode::ServerError => {
            Error::ServiceUnavailable(format!("Server error: {}", message))
        }
        OpenAIErrorCode::Unknown => Error::Inference(message.to_string()),
    }
}

/// Build the error for a non-success response from an OpenAI-compatible API.
pub fn error_from_response(status: u16, body: &str) -> Error {
    let parsed = OpenAIErrorResponse::parse(body);
    let code = OpenAIErrorCode::from_response(status, &parsed.error.error_type);
    to_vox_error(
        code,
        &format!("API returned {}: {}", status, parsed.error.message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::ErrorClass;

    #[test]
    fn test_error_code_from_401() {
        let code = OpenAIErrorCode::from_response(401, "invalid_api_key");
        assert_eq!(code, OpenAIErrorCode::AuthenticationError);
    }

    #[test]
    fn test_error_code_from_429() {
        let code = OpenAIErrorCode::from_response(429, "rate_limit_exceeded");
        assert_eq!(code, OpenAIErrorCode::RateLimitExceeded);
    }

    #[test]
    fn test_error_code_from_404() {
        let code = OpenAIErrorCode::from_response(404, "model_not_found");
        assert_eq!(code, OpenAIErrorCode::ModelNotFound);
    }

    #[test]
    fn test_error_code_from_5xx() {
        assert_eq!(
            OpenAIErrorCode::from_response(500, "server_error"),
            OpenAIErrorCode::ServerError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(503, "unavailable"),
            OpenAIErrorCode::ServerError
        );
    }

    #[test]
    fn test_error_code_for_bad_media() {
        assert_eq!(
            OpenAIErrorCode::from_response(415, ""),
            OpenAIErrorCode::UnsupportedMedia
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "invalid_file_format"),
            OpenAIErrorCode::UnsupportedMedia
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "invalid_request_error"),
            OpenAIErrorCode::InvalidRequest
        );
    }

    #[test]
    fn test_error_code_from_unknown() {
        let code = OpenAIErrorCode::from_response(418, "im_a_teapot");
        assert_eq!(code, OpenAIErrorCode::Unknown);
    }

    #[test]
    fn test_only_transient_codes_are_retryable() {
        for (code, retryable) in [
            (OpenAIErrorCode::AuthenticationError, false),
            (OpenAIErrorCode::RateLimitExceeded, true),
            (OpenAIErrorCode::ModelNotFound, false),
            (OpenAIErrorCode::ContextLengthExceeded, false),
            (OpenAIErrorCode::UnsupportedMedia, false),
            (OpenAIErrorCode::InvalidRequest, false),
            (OpenAIErrorCode::ServerError, true),
            (OpenAIErrorCode::Unknown, true),
        ] {
            let err = to_vox_error(code, "x");
            assert_eq!(
                err.class().is_retryable(),
                retryable,
                "{:?} maps to {}",
                code,
                err.class()
            );
        }
    }

    #[test]
    fn test_error_from_response() {
        let err = error_from_response(
            401,
            r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#,
        );
        assert_eq!(err.class(), ErrorClass::PermanentAuthError);
        assert!(err.to_string().contains("Incorrect API key"));

        let err = error_from_response(429, "slow down");
        assert_eq!(err.class(), ErrorClass::RateLimited);
        assert!(err.to_string().contains("429"));
    }
}
