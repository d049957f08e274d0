//! Transcription backend traits and implementations for audio-to-text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use vox_core::defaults::{
    DEFAULT_WHISPER_BASE_URL, DEFAULT_WHISPER_MODEL, ENV_WHISPER_BASE_URL, ENV_WHISPER_MODEL,
    JOB_TIMEOUT_SECS,
};
use vox_core::{Error, Result};

use crate::openai::error_from_response;

/// A segment of transcribed audio with timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Result of audio transcription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub full_text: String,
    /// Timestamped segments.
    pub segments: Vec<TranscriptionSegment>,
    /// Detected language (ISO 639-1 code).
    pub language: Option<String>,
    /// Total audio duration in seconds.
    pub duration_secs: Option<f64>,
}

/// Backend for transcribing audio files.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe audio data.
    async fn transcribe(
        &self,
        audio_data: &[u8],
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult>;

    /// Check if the transcription backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible Whisper backend (OpenAI cloud, Speaches, faster-whisper-server).
pub struct WhisperBackend {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl WhisperBackend {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key: None,
            client: reqwest::Client::new(),
            timeout_secs: JOB_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Create from environment variables.
    ///
    /// Uses `WHISPER_BASE_URL` when set, otherwise the OpenAI cloud when
    /// `OPENAI_API_KEY` is available. Returns None when neither is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("WHISPER_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());

        let base_url = match std::env::var(ENV_WHISPER_BASE_URL) {
            Ok(url) if !url.is_empty() => url,
            _ if api_key.is_some() => DEFAULT_WHISPER_BASE_URL.to_string(),
            _ => return None,
        };
        let model = std::env::var(ENV_WHISPER_MODEL)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string());

        let mut backend = Self::new(base_url, model);
        backend.api_key = api_key;
        Some(backend)
    }
}

/// Map a MIME type to the file extension Whisper expects in the upload name.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/webm" | "video/webm" => "webm",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        _ => "wav",
    }
}

/// OpenAI Whisper API response format.
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait]
impl TranscriptionBackend for WhisperBackend {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let ext = extension_for_mime(mime_type);

        debug!(
            model = %self.model,
            mime_type,
            size = audio_data.len(),
            "Sending transcription request"
        );

        let file_part = reqwest::multipart::Part::bytes(audio_data.to_vec())
            .file_name(format!("audio.{}", ext))
            .mime_str(mime_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid media type {}: {}", mime_type, e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let mut request = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            Error::Inference(format!("Failed to parse whisper response: {}", e))
        })?;

        let segments = result
            .segments
            .unwrap_or_default()
            .into_iter()
            .map(|s| TranscriptionSegment {
                start_secs: s.start,
                end_secs: s.end,
                text: s.text,
            })
            .collect();

        Ok(TranscriptionResult {
            full_text: result.text.trim().to_string(),
            segments,
            language: result.language,
            duration_secs: result.duration,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Stand-in used when no transcription endpoint is configured.
///
/// Every call fails with a configuration error, which is never retried.
pub struct UnconfiguredTranscription;

#[async_trait]
impl TranscriptionBackend for UnconfiguredTranscription {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _mime_type: &str,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        Err(Error::Config(
            "No transcription backend configured (set OPENAI_API_KEY or WHISPER_BASE_URL)"
                .to_string(),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn model_name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::ErrorClass;

    #[test]
    fn test_transcription_result_serialization() {
        let result = TranscriptionResult {
            full_text: "Hello world. This is a test.".to_string(),
            segments: vec![
                TranscriptionSegment {
                    start_secs: 0.0,
                    end_secs: 2.5,
                    text: "Hello world.".to_string(),
                },
                TranscriptionSegment {
                    start_secs: 2.5,
                    end_secs: 5.0,
                    text: "This is a test.".to_string(),
                },
            ],
            language: Some("en".to_string()),
            duration_secs: Some(5.0),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["full_text"], "Hello world. This is a test.");
        assert_eq!(json["segments"].as_array().unwrap().len(), 2);
        assert_eq!(json["language"], "en");
        assert_eq!(json["duration_secs"], 5.0);
    }

    #[test]
    fn test_whisper_backend_new() {
        let backend =
            WhisperBackend::new("http://localhost:8000/".to_string(), "whisper-1".to_string());
        assert_eq!(backend.base_url, "http://localhost:8000");
        assert_eq!(backend.model, "whisper-1");
        assert_eq!(backend.timeout_secs, JOB_TIMEOUT_SECS);
        assert!(backend.api_key.is_none());
        assert_eq!(backend.model_name(), "whisper-1");
    }

    #[test]
    fn test_whisper_backend_builders() {
        let backend = WhisperBackend::new(
            "http://test:8000".to_string(),
            DEFAULT_WHISPER_MODEL.to_string(),
        )
        .with_api_key("sk-test")
        .with_timeout_secs(30);
        assert_eq!(backend.api_key.as_deref(), Some("sk-test"));
        assert_eq!(backend.timeout_secs, 30);
    }

    #[test]
    fn test_whisper_response_deserialization() {
        let json = r#"{
            "text": "Hello world",
            "segments": [
                {"start": 0.0, "end": 2.5, "text": "Hello"},
                {"start": 2.5, "end": 5.0, "text": "world"}
            ],
            "language": "en",
            "duration": 5.0
        }"#;

        let response: WhisperResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text, "Hello world");
        assert_eq!(response.segments.as_ref().unwrap().len(), 2);
        assert_eq!(response.language.as_deref(), Some("en"));
        assert_eq!(response.duration, Some(5.0));
    }

    #[test]
    fn test_whisper_response_deserialization_minimal() {
        let json = r#"{"text": "Hello world"}"#;

        let response: WhisperResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text, "Hello world");
        assert!(response.segments.is_none());
        assert!(response.language.is_none());
        assert!(response.duration.is_none());
    }

    #[test]
    fn test_extension_for_mime() {
        let cases = [
            ("audio/mpeg", "mp3"),
            ("audio/mp3", "mp3"),
            ("audio/x-wav", "wav"),
            ("audio/ogg", "ogg"),
            ("audio/flac", "flac"),
            ("audio/mp4", "m4a"),
            ("video/mp4", "mp4"),
            ("video/webm", "webm"),
            ("video/x-matroska", "mkv"),
            ("application/octet-stream", "wav"),
        ];
        for (mime, ext) in cases {
            assert_eq!(extension_for_mime(mime), ext, "mime {}", mime);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_fails_permanently() {
        let err = UnconfiguredTranscription
            .transcribe(b"data", "audio/mpeg", None)
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::PermanentAuthError);
        assert!(!UnconfiguredTranscription.health_check().await.unwrap());
    }
}
