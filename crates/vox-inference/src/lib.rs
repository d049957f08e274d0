//! # vox-inference
//!
//! External collaborators for the vox transcription engine.
//!
//! This crate provides:
//! - Transcription backend trait and an OpenAI-compatible Whisper client
//! - Summarization backend trait and an OpenAI chat-completions client
//! - Remote media fetching (direct HTTP, Google Drive, yt-dlp platforms)
//! - Media probing via `ffprobe` and splitting of oversized media via `ffmpeg`
//!
//! # Feature Flags
//!
//! - `mock`: Expose scripted mock backends for tests in dependent crates
//!
//! # Example
//!
//! ```rust,no_run
//! use vox_inference::{TranscriptionBackend, WhisperBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = WhisperBackend::from_env().expect("whisper not configured");
//!     let audio = std::fs::read("talk.mp3").unwrap();
//!     let result = backend.transcribe(&audio, "audio/mpeg", None).await.unwrap();
//!     println!("{}", result.full_text);
//! }
//! ```

pub mod media;
pub mod openai;
pub mod platform;
pub mod summarization;
pub mod transcription;

// Scripted backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use vox_core::*;

pub use media::{
    format_duration, parse_ffprobe_output, plan_chunks, ChunkSpan, FfmpegSplitter, MediaProbe,
    MediaSplitter, FFMPEG_INSTALL_COMMAND,
};
pub use openai::{OpenAIConfig, OpenAISummarizer};
pub use platform::{
    detect_url_type, google_drive_file_id, validate_url, FetchedMedia, MediaFetcher,
    PlatformFetcher, YTDLP_INSTALL_COMMAND,
};
pub use summarization::SummarizationBackend;
pub use transcription::{
    extension_for_mime, TranscriptionBackend, TranscriptionResult, TranscriptionSegment,
    UnconfiguredTranscription, WhisperBackend,
};
