//! Job handlers for each source kind.

use async_trait::async_trait;
use uuid::Uuid;

use vox_core::{Error, JobRecord, JobSource, SourceKind, TranscriptResult};

/// Context provided to job handlers.
pub struct JobContext {
    /// Snapshot of the job taken when it was claimed.
    pub job: JobRecord,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: JobRecord) -> Self {
        Self { job }
    }

    pub fn job_id(&self) -> Uuid {
        self.job.job_id
    }

    /// 1-based number of the attempt being executed.
    pub fn attempt(&self) -> u32 {
        self.job.attempt_count
    }

    pub fn source(&self) -> &JobSource {
        &self.job.source
    }
}

/// Result of one job attempt.
#[derive(Debug)]
pub enum JobResult {
    /// The attempt produced a transcript.
    Success(TranscriptResult),
    /// The attempt failed; the worker classifies the error for retry.
    Failed(Error),
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success(_))
    }
}

impl From<vox_core::Result<TranscriptResult>> for JobResult {
    fn from(result: vox_core::Result<TranscriptResult>) -> Self {
        match result {
            Ok(transcript) => JobResult::Success(transcript),
            Err(e) => JobResult::Failed(e),
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The source kind this handler processes.
    fn source_kind(&self) -> SourceKind;

    /// Execute one attempt of the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// Handler that succeeds immediately with a fixed transcript.
pub struct NoOpHandler {
    kind: SourceKind,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given source kind.
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn source_kind(&self) -> SourceKind {
        self.kind
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::Success(TranscriptResult::new(format!(
            "no-op transcript for {}",
            ctx.source().display_name()
        )))
    }
}
