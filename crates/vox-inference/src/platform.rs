//! URL platform detection and remote media fetching.
//!
//! Direct links and Google Drive files are downloaded over HTTP; YouTube and
//! LinkedIn go through the external `yt-dlp` binary.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use tokio::process::Command;
use tracing::{debug, warn};

use vox_core::defaults::{FETCH_TIMEOUT_SECS, MAX_CONTENT_LENGTH, YTDLP_PATH};
use vox_core::{detect_content_type, Error, Result, UrlType};

/// Extensions that mark a URL as a direct media link.
const DIRECT_MEDIA_EXTENSIONS: &[&str] = &[".mp3", ".mp4", ".wav", ".m4a", ".flac"];

/// LinkedIn paths that carry a video post.
const LINKEDIN_VIDEO_PATHS: &[&str] = &["/feed/update/urn:li:activity:", "/posts/"];

static DRIVE_FILE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("valid regex"));

/// Install hint returned when the downloader binary is missing.
pub const YTDLP_INSTALL_COMMAND: &str = "pip install yt-dlp";

/// Parse and check a submitted URL: it must be absolute http(s) with a host.
pub fn validate_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("No URL provided".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| Error::InvalidInput(format!("Invalid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "Invalid URL: unsupported scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidInput("Invalid URL: missing host".to_string()));
    }
    Ok(url)
}

/// Identify the platform hosting a URL.
pub fn detect_url_type(url: &Url) -> UrlType {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let path = url.path().to_lowercase();

    if host.contains("drive.google.com") {
        UrlType::GoogleDrive
    } else if host.contains("linkedin.com")
        && LINKEDIN_VIDEO_PATHS
            .iter()
            .any(|p| url.path().contains(p))
    {
        UrlType::Linkedin
    } else if host.ends_with("youtube.com") || host == "youtu.be" {
        UrlType::Youtube
    } else if DIRECT_MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        UrlType::DirectMedia
    } else {
        UrlType::Unknown
    }
}

/// Extract the file id from a Google Drive share or download link.
pub fn google_drive_file_id(url: &Url) -> Option<String> {
    if let Some(caps) = DRIVE_FILE_PATH.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Map a non-success download status onto the error taxonomy.
pub fn status_error(status: u16, url: &str) -> Error {
    let message = format!("Download of {} returned HTTP {}", url, status);
    match status {
        401 | 403 => Error::Unauthorized(message),
        404 | 410 => Error::InvalidInput(message),
        415 => Error::UnsupportedFormat(message),
        429 => Error::RateLimited(message),
        500..=599 => Error::ServiceUnavailable(message),
        _ => Error::InvalidInput(message),
    }
}

/// Media bytes fetched from a remote source.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Fetches media for URL submissions.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the media behind `url`, using the strategy for `url_type`.
    async fn fetch(&self, url: &str, url_type: UrlType) -> Result<FetchedMedia>;

    /// External tools required for `url_type` that are not installed.
    async fn missing_dependencies(&self, url_type: UrlType) -> Vec<String>;
}

/// Default fetcher: reqwest for HTTP downloads, `yt-dlp` for video platforms.
pub struct PlatformFetcher {
    client: Client,
    ytdlp_path: String,
    max_bytes: u64,
    timeout: Duration,
}

impl Default for PlatformFetcher {
    fn default() -> Self {
        Self::new(YTDLP_PATH, MAX_CONTENT_LENGTH)
    }
}

impl PlatformFetcher {
    pub fn new(ytdlp_path: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            client: Client::new(),
            ytdlp_path: ytdlp_path.into(),
            max_bytes,
            timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from environment variables (`YTDLP_PATH`, `MAX_CONTENT_LENGTH`).
    pub fn from_env() -> Self {
        let ytdlp_path = std::env::var("YTDLP_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| YTDLP_PATH.to_string());
        let max_bytes = std::env::var("MAX_CONTENT_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MAX_CONTENT_LENGTH);
        Self::new(ytdlp_path, max_bytes)
    }

    /// Whether the `yt-dlp` binary can be executed.
    pub async fn ytdlp_available(&self) -> bool {
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.arg("--version").kill_on_drop(true);
        cmd.output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn download_http(&self, url: &str, fallback_stem: &str) -> Result<FetchedMedia> {
        debug!(url, "Downloading media over HTTP");
        let mut response = self.client.get(url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), url));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large());
            }
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (data.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large());
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Downloaded file from {} is empty",
                url
            )));
        }

        let filename = filename_from_url(url, header_type.as_deref(), fallback_stem);
        let content_type = match header_type {
            Some(t) if t.starts_with("audio/") || t.starts_with("video/") => t,
            _ => detect_content_type(&filename, &data),
        };

        Ok(FetchedMedia {
            data,
            filename,
            content_type,
        })
    }

    async fn download_with_ytdlp(&self, url: &str, format: &str) -> Result<FetchedMedia> {
        let dir = tempfile::tempdir()?;
        let template = dir.path().join("%(id)s.%(ext)s");

        debug!(url, ytdlp = %self.ytdlp_path, "Downloading media with yt-dlp");
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("-f")
            .arg(format)
            .arg("--max-filesize")
            .arg(self.max_bytes.to_string())
            .arg("-o")
            .arg(&template)
            .arg(url)
            .kill_on_drop(true);

        // Platform downloads get a longer budget than plain HTTP fetches
        let output = match tokio::time::timeout(self.timeout * 5, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Config(format!(
                    "yt-dlp is not installed ({})",
                    YTDLP_INSTALL_COMMAND
                )))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(Error::Timeout(format!("yt-dlp download of {} timed out", url)))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(ytdlp_error(&stderr));
        }

        let path = first_file(dir.path()).await?;
        let data = tokio::fs::read(&path).await?;
        if data.is_empty() {
            return Err(Error::InvalidInput("Downloaded file is empty".to_string()));
        }
        if data.len() as u64 > self.max_bytes {
            return Err(self.too_large());
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download.mp4")
            .to_string();
        let content_type = detect_content_type(&filename, &data);
        Ok(FetchedMedia {
            data,
            filename,
            content_type,
        })
    }

    fn too_large(&self) -> Error {
        Error::PayloadTooLarge(format!(
            "Remote file exceeds maximum size of {} bytes",
            self.max_bytes
        ))
    }
}

#[async_trait]
impl MediaFetcher for PlatformFetcher {
    async fn fetch(&self, url: &str, url_type: UrlType) -> Result<FetchedMedia> {
        match url_type {
            UrlType::GoogleDrive => {
                let parsed = validate_url(url)?;
                let file_id = google_drive_file_id(&parsed).ok_or_else(|| {
                    Error::InvalidInput("Invalid Google Drive URL".to_string())
                })?;
                let download_url = format!(
                    "https://drive.google.com/uc?id={}&export=download",
                    file_id
                );
                self.download_http(&download_url, &format!("gdrive_{}", file_id))
                    .await
            }
            UrlType::Youtube => {
                self.download_with_ytdlp(url, "bestaudio/best[ext=mp4]/best")
                    .await
            }
            UrlType::Linkedin => self.download_with_ytdlp(url, "mp4/best[ext=mp4]/best").await,
            UrlType::DirectMedia | UrlType::Unknown => self.download_http(url, "media_file").await,
        }
    }

    async fn missing_dependencies(&self, url_type: UrlType) -> Vec<String> {
        if url_type.requires_downloader() && !self.ytdlp_available().await {
            vec!["yt-dlp".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Choose a file name for downloaded bytes.
fn filename_from_url(url: &str, content_type: Option<&str>, fallback_stem: &str) -> String {
    let from_path = Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segs| segs.next_back().map(str::to_string))
            .filter(|name| name.contains('.') && !name.starts_with('.'))
    });
    if let Some(name) = from_path {
        return name;
    }

    let ext = match content_type {
        Some(t) if t.starts_with("audio/") => "mp3",
        _ => "mp4",
    };
    format!("{}.{}", fallback_stem, ext)
}

/// Classify a yt-dlp failure from its stderr.
fn ytdlp_error(stderr: &str) -> Error {
    let lower = stderr.to_lowercase();
    let message = format!("yt-dlp failed: {}", stderr.trim());
    if lower.contains("http error 429") || lower.contains("too many requests") {
        Error::RateLimited(message)
    } else if lower.contains("sign in") || lower.contains("login") || lower.contains("http error 403")
    {
        Error::Unauthorized(message)
    } else if lower.contains("unsupported url")
        || lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("http error 404")
    {
        Error::InvalidInput(message)
    } else if lower.contains("larger than max-filesize") || lower.contains("file is larger") {
        Error::PayloadTooLarge(message)
    } else {
        Error::Request(message)
    }
}

async fn first_file(dir: &Path) -> Result<std::path::PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            return Ok(entry.path());
        }
    }
    Err(Error::InvalidInput("No file downloaded".to_string()))
}
