//! Server configuration read from the environment.

use std::path::PathBuf;

use axum::http::HeaderValue;
use tracing::warn;

use vox_core::defaults;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Settings for the HTTP surface and the storage folders behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub upload_folder: PathBuf,
    pub transcription_folder: PathBuf,
    /// Largest accepted request body, in bytes.
    pub max_content_length: u64,
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            upload_folder: PathBuf::from(defaults::UPLOAD_FOLDER),
            transcription_folder: PathBuf::from(defaults::TRANSCRIPTION_FOLDER),
            max_content_length: defaults::MAX_CONTENT_LENGTH,
            allowed_origins: parse_origin_list(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl ApiConfig {
    /// Load from `HOST`, `PORT`, `UPLOAD_FOLDER`, `TRANSCRIPTION_FOLDER`,
    /// `MAX_CONTENT_LENGTH` and `ALLOWED_ORIGINS`.
    pub fn from_env() -> Self {
        let base = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or(base.host),
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.port),
            upload_folder: var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(base.upload_folder),
            transcription_folder: var("TRANSCRIPTION_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(base.transcription_folder),
            max_content_length: var("MAX_CONTENT_LENGTH")
                .and_then(|v| v.parse().ok())
                .filter(|&n: &u64| n > 0)
                .unwrap_or(base.max_content_length),
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|v| parse_origin_list(&v))
                .unwrap_or(base.allowed_origins),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origins as header values; invalid entries are logged and skipped.
    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", origin, e);
                    None
                }
            })
            .collect()
    }

    /// Request body ceiling with headroom for multipart framing.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_content_length)
            .unwrap_or(usize::MAX)
            .saturating_add(64 * 1024)
    }
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
