//! Cookie-backed client sessions.
//!
//! Every request runs under a session id taken from the `vox_session`
//! cookie. Requests without a usable cookie get a fresh id, which is set on
//! the response.

use axum::extract::{FromRequestParts, Request};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use vox_core::defaults::SESSION_COOKIE;
use vox_db::SessionRegistry;

use crate::error::ApiError;

const MAX_SESSION_ID_LEN: usize = 64;

/// The calling client's session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(pub String);

impl Session {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| {
                ApiError::Internal(vox_core::Error::Internal(
                    "session middleware not installed".to_string(),
                ))
            })
    }
}

/// Attach a session to the request, issuing a cookie when needed.
///
/// Nothing is registered here; a session only occupies the registry once it
/// submits a job.
pub async fn session_middleware(mut request: Request, next: Next) -> Response {
    let existing = session_from_headers(request.headers());
    let is_new = existing.is_none();
    let session_id = existing.unwrap_or_else(SessionRegistry::new_session_id);

    if is_new {
        debug!(session_id = %session_id, "Issued new session");
    }

    request
        .extensions_mut()
        .insert(Session(session_id.clone()));
    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Read a well-formed session id from the `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| is_valid_session_id(value))
}

fn is_valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
