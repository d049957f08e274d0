//! Core traits for vox abstractions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{JobRecord, Result, SummaryResult, TranscriptResult};

/// Storage for job records.
///
/// Every mutating method applies one state-machine transition atomically with
/// respect to other calls on the same job, and returns the updated record.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a new record. Fails with `InvalidState` if the id already exists.
    async fn insert(&self, record: JobRecord) -> Result<()>;

    /// Snapshot of a single record.
    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>>;

    /// Snapshots of the given records, in input order, skipping missing ids.
    async fn get_many(&self, job_ids: &[Uuid]) -> Result<Vec<JobRecord>>;

    /// Move a queued record to processing.
    ///
    /// Returns `None` when the record is missing or no longer queued, so two
    /// executors can never both claim the same job.
    async fn claim(&self, job_id: Uuid) -> Result<Option<JobRecord>>;

    /// Move a processing record to completed with its result.
    async fn complete(&self, job_id: Uuid, result: TranscriptResult) -> Result<JobRecord>;

    /// Move a processing record back to queued after a retryable failure.
    async fn requeue(&self, job_id: Uuid, error: &str) -> Result<JobRecord>;

    /// Move a processing record to failed.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<JobRecord>;

    /// Attach a summary to a completed record.
    async fn attach_summary(&self, job_id: Uuid, summary: &SummaryResult) -> Result<JobRecord>;

    /// Drop a record, returning it if it existed.
    async fn remove(&self, job_id: Uuid) -> Result<Option<JobRecord>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
