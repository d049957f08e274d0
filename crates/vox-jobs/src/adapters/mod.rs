//! Transcription handlers for each source kind.

pub mod file_transcribe;
pub mod url_transcribe;

pub use file_transcribe::FileTranscribeHandler;
pub use url_transcribe::UrlTranscribeHandler;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use vox_core::defaults::{CHUNK_TARGET_BYTES, WHISPER_MAX_REQUEST_BYTES};
use vox_core::{Result, TranscriptResult};
use vox_inference::{
    extension_for_mime, FfmpegSplitter, MediaProbe, MediaSplitter, TranscriptionBackend,
    TranscriptionResult,
};

/// Convert backend output into the stored job result.
pub(crate) fn transcript_from(output: TranscriptionResult, model: &str) -> TranscriptResult {
    let mut transcript = TranscriptResult::new(output.full_text);
    transcript.language = output.language;
    transcript.duration_secs = output.duration_secs;
    transcript.model = Some(model.to_string());
    transcript
}

/// How media larger than one transcription request is handled.
///
/// Payloads above `max_request_bytes` are cut into pieces of about
/// `chunk_target_bytes`, transcribed in order, and joined.
#[derive(Clone)]
pub struct Chunking {
    splitter: Arc<dyn MediaSplitter>,
    max_request_bytes: u64,
    chunk_target_bytes: u64,
}

impl Default for Chunking {
    fn default() -> Self {
        Self::new(Arc::new(FfmpegSplitter::from_env(MediaProbe::from_env())))
    }
}

impl Chunking {
    pub fn new(splitter: Arc<dyn MediaSplitter>) -> Self {
        Self {
            splitter,
            max_request_bytes: WHISPER_MAX_REQUEST_BYTES,
            chunk_target_bytes: CHUNK_TARGET_BYTES,
        }
    }

    pub fn with_limits(mut self, max_request_bytes: u64, chunk_target_bytes: u64) -> Self {
        self.max_request_bytes = max_request_bytes;
        self.chunk_target_bytes = chunk_target_bytes.min(max_request_bytes).max(1);
        self
    }

    pub(crate) async fn transcribe(
        &self,
        backend: &dyn TranscriptionBackend,
        job_id: Uuid,
        data: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<TranscriptionResult> {
        if data.len() as u64 <= self.max_request_bytes {
            return backend.transcribe(data, mime_type, None).await;
        }

        let extension = extension_of(filename, mime_type);
        let chunks = self
            .splitter
            .split(data, &extension, self.chunk_target_bytes)
            .await?;
        info!(
            job_id = %job_id,
            size = data.len(),
            chunks = chunks.len(),
            "Transcribing oversized media in chunks"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            parts.push(backend.transcribe(chunk, mime_type, None).await?);
        }
        Ok(merge_parts(parts))
    }
}

fn extension_of(filename: &str, mime_type: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| extension_for_mime(mime_type).to_string())
}

/// Join per-chunk results, shifting segment timestamps onto one timeline.
fn merge_parts(parts: Vec<TranscriptionResult>) -> TranscriptionResult {
    let mut texts = Vec::with_capacity(parts.len());
    let mut merged = TranscriptionResult {
        full_text: String::new(),
        segments: Vec::new(),
        language: None,
        duration_secs: None,
    };
    let mut offset = 0.0;

    for part in parts {
        let text = part.full_text.trim();
        if !text.is_empty() {
            texts.push(text.to_string());
        }
        if merged.language.is_none() {
            merged.language = part.language;
        }
        let span = part
            .duration_secs
            .or_else(|| part.segments.last().map(|s| s.end_secs))
            .unwrap_or(0.0);
        merged
            .segments
            .extend(part.segments.into_iter().map(|mut s| {
                s.start_secs += offset;
                s.end_secs += offset;
                s
            }));
        if let Some(d) = part.duration_secs {
            merged.duration_secs = Some(merged.duration_secs.unwrap_or(0.0) + d);
        }
        offset += span;
    }

    merged.full_text = texts.join(" ");
    merged
}
