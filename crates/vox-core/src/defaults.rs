//! Centralized default constants for the vox service.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration loaders (`from_env` constructors) fall back to these when the
//! corresponding environment variable is unset or unparsable.

// =============================================================================
// UPLOADS & STORAGE
// =============================================================================

/// Maximum accepted upload / download size in bytes (100 MiB).
pub const MAX_CONTENT_LENGTH: u64 = 100 * 1024 * 1024;

/// Directory for uploaded media files.
pub const UPLOAD_FOLDER: &str = "uploads";

/// Directory for persisted transcript text files.
pub const TRANSCRIPTION_FOLDER: &str = "transcriptions";

/// Accepted audio extensions (lowercase, without dot).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma"];

/// Accepted video extensions (lowercase, without dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv"];

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Maximum number of attempts per job, first attempt included.
pub const JOB_MAX_RETRIES: u32 = 3;

/// Backoff before the second attempt, in milliseconds.
pub const JOB_RETRY_BASE_DELAY_MS: u64 = 2_000;

/// Ceiling for the retry backoff, in milliseconds.
pub const JOB_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Default executor pool size.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Per-attempt execution timeout in seconds (5 minutes).
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Environment variable naming the Whisper-compatible endpoint.
pub const ENV_WHISPER_BASE_URL: &str = "WHISPER_BASE_URL";

/// Environment variable naming the Whisper model.
pub const ENV_WHISPER_MODEL: &str = "WHISPER_MODEL";

/// Default Whisper-compatible endpoint (OpenAI cloud).
pub const DEFAULT_WHISPER_BASE_URL: &str = "https://api.openai.com";

/// Default Whisper model.
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

/// Default summarization model.
pub const SUMMARY_MODEL: &str = "gpt-4o-mini";

/// Token budget for a structured summary.
pub const SUMMARY_MAX_TOKENS: u32 = 1000;

/// Token budget for key topic extraction.
pub const KEY_TOPICS_MAX_TOKENS: u32 = 500;

/// Timeout for summarization requests in seconds.
pub const SUMMARY_TIMEOUT_SECS: u64 = 120;

/// Timeout for remote media downloads in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 60;

/// Default yt-dlp binary.
pub const YTDLP_PATH: &str = "yt-dlp";

/// Default ffprobe binary.
pub const FFPROBE_PATH: &str = "ffprobe";

/// Default ffmpeg binary, used to split oversized media.
pub const FFMPEG_PATH: &str = "ffmpeg";

/// Largest media payload sent to the transcription API in one request (25 MiB).
pub const WHISPER_MAX_REQUEST_BYTES: u64 = 25 * 1024 * 1024;

/// Target size of each piece when oversized media is split (20 MiB).
pub const CHUNK_TARGET_BYTES: u64 = 20 * 1024 * 1024;

// =============================================================================
// HTTP
// =============================================================================

/// Default bind host.
pub const HOST: &str = "0.0.0.0";

/// Default bind port.
pub const PORT: u16 = 3000;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "vox_session";
