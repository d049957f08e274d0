//! UrlTranscribe handler - fetches remote media, then transcribes it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use vox_core::{Error, JobSource, Resolution, Result, SourceKind, TranscriptResult, UrlType};
use vox_inference::{MediaFetcher, TranscriptionBackend};

use super::{transcript_from, Chunking};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Handler for URL submissions.
///
/// Basic submissions are fetched as plain downloads; enhanced submissions use
/// the strategy for the platform detected at submission time.
pub struct UrlTranscribeHandler {
    backend: Arc<dyn TranscriptionBackend>,
    fetcher: Arc<dyn MediaFetcher>,
    chunking: Chunking,
}

impl UrlTranscribeHandler {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            backend,
            fetcher,
            chunking: Chunking::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = chunking;
        self
    }

    async fn transcribe(&self, ctx: &JobContext) -> Result<TranscriptResult> {
        let (url, url_type) = match ctx.source() {
            JobSource::Url {
                url,
                resolved_via: Resolution::Basic,
                ..
            } => (url, UrlType::DirectMedia),
            JobSource::Url {
                url,
                resolved_via: Resolution::Enhanced,
                url_type,
            } => (url, url_type.unwrap_or(UrlType::Unknown)),
            other => {
                return Err(Error::InvalidInput(format!(
                    "url handler received a {:?} source",
                    other.kind()
                )))
            }
        };

        let media = self.fetcher.fetch(url, url_type).await?;
        debug!(
            job_id = %ctx.job_id(),
            url = %url,
            url_type = %url_type.as_str(),
            filename = %media.filename,
            size = media.data.len(),
            "Fetched remote media"
        );

        let output = self
            .chunking
            .transcribe(
                self.backend.as_ref(),
                ctx.job_id(),
                &media.data,
                &media.filename,
                &media.content_type,
            )
            .await?;
        Ok(transcript_from(output, self.backend.model_name()))
    }
}

#[async_trait]
impl JobHandler for UrlTranscribeHandler {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Url
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        self.transcribe(&ctx).await.into()
    }
}
