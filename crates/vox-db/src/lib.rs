//! # vox-db
//!
//! Process-local storage layer for vox.
//!
//! This crate provides:
//! - The job record store with per-record atomic transitions
//! - The session registry mapping sessions to their jobs
//! - The dispatch queue consumed by the executor pool
//! - Upload and transcript file storage
//!
//! ## Example
//!
//! ```rust,ignore
//! use vox_db::Database;
//!
//! let db = Database::in_memory("uploads", "transcriptions");
//! db.jobs.insert(record).await?;
//! db.sessions.link(&session_id, job_id).await;
//! db.queue.push(job_id);
//! ```

pub mod file_storage;
pub mod jobs;
pub mod queue;
pub mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

// Re-export core types
pub use vox_core::*;

pub use file_storage::{
    transcript_storage_name, upload_storage_name, FileStorage, FilesystemBackend, StorageBackend,
};
pub use jobs::MemoryJobRepository;
pub use queue::JobQueue;
pub use sessions::SessionRegistry;

/// Combined storage context shared by the scheduler, the workers and the API.
#[derive(Clone)]
pub struct Database {
    /// Job records.
    pub jobs: Arc<dyn JobRepository>,
    /// Session to job ownership.
    pub sessions: Arc<SessionRegistry>,
    /// Ids waiting for an executor.
    pub queue: Arc<JobQueue>,
    /// Upload and transcript files.
    pub files: FileStorage,
}

impl Database {
    /// Build a database with the in-memory job repository.
    pub fn in_memory(
        upload_folder: impl Into<PathBuf>,
        transcription_folder: impl Into<PathBuf>,
    ) -> Self {
        Self::with_repository(
            Arc::new(MemoryJobRepository::new()),
            FileStorage::new(upload_folder, transcription_folder),
        )
    }

    /// Build a database around a custom job repository.
    pub fn with_repository(jobs: Arc<dyn JobRepository>, files: FileStorage) -> Self {
        Self {
            jobs,
            sessions: Arc::new(SessionRegistry::new()),
            queue: Arc::new(JobQueue::new()),
            files,
        }
    }

    /// Remove a record together with its upload and transcript files.
    ///
    /// File deletion failures are logged and do not fail the purge.
    pub async fn purge(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let Some(record) = self.jobs.remove(job_id).await? else {
            return Ok(None);
        };

        if let JobSource::File { stored_path, .. } = &record.source {
            if let Err(e) = self.files.delete_upload(stored_path).await {
                warn!(job_id = %job_id, error = %e, "Failed to delete upload");
            }
        }
        if let Err(e) = self.files.delete_transcript(job_id).await {
            warn!(job_id = %job_id, error = %e, "Failed to delete transcript");
        }

        debug!(job_id = %job_id, status = %record.status, "Job purged");
        Ok(Some(record))
    }
}
