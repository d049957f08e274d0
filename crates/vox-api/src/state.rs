//! Shared application state handed to every handler.

use std::sync::Arc;

use vox_inference::{MediaFetcher, MediaProbe, SummarizationBackend, TranscriptionBackend};
use vox_jobs::JobScheduler;

/// Everything a request needs: the scheduler plus handles used for
/// dependency reporting.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: JobScheduler,
    pub transcriber: Arc<dyn TranscriptionBackend>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub summarizer: Option<Arc<dyn SummarizationBackend>>,
    pub probe: Option<MediaProbe>,
}

impl AppState {
    pub fn new(
        scheduler: JobScheduler,
        transcriber: Arc<dyn TranscriptionBackend>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            scheduler,
            transcriber,
            fetcher,
            summarizer: None,
            probe: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn SummarizationBackend>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Whether `ffprobe` is installed. False when probing is disabled.
    pub async fn ffprobe_available(&self) -> bool {
        match &self.probe {
            Some(probe) => probe.is_available().await,
            None => false,
        }
    }
}
