//! Scripted mock collaborators for deterministic testing.
//!
//! Each mock replays a script of [`MockStep`]s, one per call, repeating the
//! last step once the script runs out, and counts the calls it receives.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vox_inference::mock::{MockStep, MockTranscriptionBackend};
//!
//! let backend = MockTranscriptionBackend::new(vec![
//!     MockStep::RateLimited,
//!     MockStep::Text("hello world".to_string()),
//! ]);
//! assert_eq!(backend.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vox_core::{Error, Result, UrlType};

use crate::media::MediaSplitter;
use crate::platform::{FetchedMedia, MediaFetcher};
use crate::summarization::SummarizationBackend;
use crate::transcription::{TranscriptionBackend, TranscriptionResult};

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    /// Succeed with the given text.
    Text(String),
    RateLimited,
    Unavailable,
    NetworkError,
    Unauthorized,
    UnsupportedFormat,
    /// Sleep, then apply the inner step.
    Delayed(Duration, Box<MockStep>),
}

impl MockStep {
    pub fn delayed(delay: Duration, step: MockStep) -> Self {
        MockStep::Delayed(delay, Box::new(step))
    }

    async fn resolve(self) -> Result<String> {
        match self {
            MockStep::Text(text) => Ok(text),
            MockStep::RateLimited => Err(Error::RateLimited("mock: too many requests".into())),
            MockStep::Unavailable => {
                Err(Error::ServiceUnavailable("mock: service unavailable".into()))
            }
            MockStep::NetworkError => Err(Error::Request("mock: connection reset".into())),
            MockStep::Unauthorized => Err(Error::Unauthorized("mock: invalid api key".into())),
            MockStep::UnsupportedFormat => {
                Err(Error::UnsupportedFormat("mock: unsupported media".into()))
            }
            MockStep::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                Box::pin(inner.resolve()).await
            }
        }
    }
}

#[derive(Debug)]
struct Script {
    steps: Mutex<Vec<MockStep>>,
    calls: AtomicUsize,
}

impl Script {
    fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps: Mutex::new(steps),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> MockStep {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let steps = match self.steps.lock() {
            Ok(steps) => steps,
            Err(poisoned) => poisoned.into_inner(),
        };
        steps
            .get(index)
            .or_else(|| steps.last())
            .cloned()
            .unwrap_or_else(|| MockStep::Text("mock transcription".to_string()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Scripted transcription backend.
#[derive(Debug, Clone)]
pub struct MockTranscriptionBackend {
    script: Arc<Script>,
    mime_types: Arc<Mutex<Vec<String>>>,
}

impl MockTranscriptionBackend {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Script::new(steps)),
            mime_types: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always succeed with `text`.
    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::new(vec![MockStep::Text(text.into())])
    }

    /// Number of transcription calls received.
    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    /// MIME types passed to each call, in order.
    pub fn mime_types(&self) -> Vec<String> {
        self.mime_types
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptionBackend for MockTranscriptionBackend {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        if let Ok(mut mimes) = self.mime_types.lock() {
            mimes.push(mime_type.to_string());
        }
        let text = self.script.next().resolve().await?;
        Ok(TranscriptionResult {
            full_text: text,
            segments: Vec::new(),
            language: language.map(str::to_string).or_else(|| Some("en".to_string())),
            duration_secs: Some(1.0),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "mock-whisper"
    }
}

/// Scripted summarizer. Summary and key-topic calls share one script.
#[derive(Debug, Clone)]
pub struct MockSummarizer {
    script: Arc<Script>,
}

impl MockSummarizer {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Script::new(steps)),
        }
    }

    /// Summaries are `"Summary: <first 20 chars>"`, topics `"- <first word>"`.
    pub fn echoing() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    async fn run(&self, fallback: String) -> Result<String> {
        let empty = self
            .script
            .steps
            .lock()
            .map(|s| s.is_empty())
            .unwrap_or(true);
        let step = self.script.next();
        if empty {
            return Ok(fallback);
        }
        step.resolve().await
    }
}

#[async_trait]
impl SummarizationBackend for MockSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String> {
        let head: String = transcript.chars().take(20).collect();
        self.run(format!("Summary: {}", head)).await
    }

    async fn extract_key_topics(&self, transcript: &str) -> Result<String> {
        let first = transcript.split_whitespace().next().unwrap_or("none");
        self.run(format!("- {}", first)).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "mock-summarizer"
    }
}

/// Scripted media fetcher. `Text` steps become the downloaded bytes.
#[derive(Debug, Clone)]
pub struct MockFetcher {
    script: Arc<Script>,
    missing: Vec<String>,
}

impl MockFetcher {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Script::new(steps)),
            missing: Vec::new(),
        }
    }

    /// Always return a small MP3 payload.
    pub fn succeeding() -> Self {
        Self::new(vec![MockStep::Text("ID3 mock audio".to_string())])
    }

    /// Report the given tools as missing for downloader platforms.
    pub fn with_missing(mut self, missing: &[&str]) -> Self {
        self.missing = missing.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, url: &str, url_type: UrlType) -> Result<FetchedMedia> {
        let body = self.script.next().resolve().await?;
        let filename = url
            .rsplit('/')
            .next()
            .filter(|n| n.contains('.'))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.mp3", url_type.as_str()));
        Ok(FetchedMedia {
            data: body.into_bytes(),
            filename,
            content_type: "audio/mpeg".to_string(),
        })
    }

    async fn missing_dependencies(&self, url_type: UrlType) -> Vec<String> {
        if url_type.requires_downloader() {
            self.missing.clone()
        } else {
            Vec::new()
        }
    }
}

/// Splitter that slices the raw bytes instead of cutting on frame boundaries.
#[derive(Debug, Clone, Default)]
pub struct MockSplitter {
    calls: Arc<AtomicUsize>,
}

impl MockSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSplitter for MockSplitter {
    async fn split(
        &self,
        data: &[u8],
        _extension: &str,
        target_bytes: u64,
    ) -> Result<Vec<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let size = usize::try_from(target_bytes.max(1)).unwrap_or(usize::MAX);
        Ok(data.chunks(size).map(<[u8]>::to_vec).collect())
    }
}
