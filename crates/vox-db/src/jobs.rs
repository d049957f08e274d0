//! In-memory job repository.
//!
//! Records live behind a per-record lock so transitions on different jobs
//! never contend, while the outer map lock is held only for lookups,
//! insertions and removals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use vox_core::{
    Error, JobRecord, JobRepository, JobStatus, Result, SummaryResult, TranscriptResult,
};

type Slot = Arc<Mutex<JobRecord>>;

/// Job repository backed by a process-local map.
#[derive(Default)]
pub struct MemoryJobRepository {
    records: RwLock<HashMap<Uuid, Slot>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, job_id: Uuid) -> Result<Slot> {
        self.records
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(Error::JobNotFound(job_id))
    }

    /// Apply one transition under the record lock and return the new snapshot.
    async fn apply<F>(&self, job_id: Uuid, transition: F) -> Result<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> Result<()> + Send,
    {
        let slot = self.slot(job_id).await?;
        let mut record = slot.lock().await;
        transition(&mut record)?;
        Ok(record.clone())
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn insert(&self, record: JobRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.job_id) {
            return Err(Error::InvalidState(format!(
                "job {} already exists",
                record.job_id
            )));
        }
        debug!(job_id = %record.job_id, session_id = %record.session_id, "Job inserted");
        records.insert(record.job_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let slot = self.records.read().await.get(&job_id).cloned();
        match slot {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_many(&self, job_ids: &[Uuid]) -> Result<Vec<JobRecord>> {
        let slots: Vec<Slot> = {
            let records = self.records.read().await;
            job_ids
                .iter()
                .filter_map(|id| records.get(id).cloned())
                .collect()
        };

        let mut snapshots = Vec::with_capacity(slots.len());
        for slot in slots {
            snapshots.push(slot.lock().await.clone());
        }
        Ok(snapshots)
    }

    async fn claim(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let Some(slot) = self.records.read().await.get(&job_id).cloned() else {
            return Ok(None);
        };
        let mut record = slot.lock().await;
        if record.status != JobStatus::Queued {
            return Ok(None);
        }
        record.claim()?;
        Ok(Some(record.clone()))
    }

    async fn complete(&self, job_id: Uuid, result: TranscriptResult) -> Result<JobRecord> {
        self.apply(job_id, move |record| record.complete(result))
            .await
    }

    async fn requeue(&self, job_id: Uuid, error: &str) -> Result<JobRecord> {
        self.apply(job_id, |record| record.requeue(error)).await
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<JobRecord> {
        self.apply(job_id, |record| record.fail(error)).await
    }

    async fn attach_summary(&self, job_id: Uuid, summary: &SummaryResult) -> Result<JobRecord> {
        self.apply(job_id, |record| record.attach_summary(summary))
            .await
    }

    async fn remove(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let slot = self.records.write().await.remove(&job_id);
        match slot {
            Some(slot) => {
                debug!(job_id = %job_id, "Job removed");
                Ok(Some(slot.lock().await.clone()))
            }
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
