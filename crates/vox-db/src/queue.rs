//! Dispatch queue of job ids waiting for an executor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;
use uuid::Uuid;

/// FIFO of queued job ids shared by the executor pool.
///
/// The queue holds ids only; the job repository remains the source of truth
/// for status, so a stale id is simply skipped when its claim fails.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: Mutex<VecDeque<Uuid>>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job id for immediate dispatch.
    pub fn push(&self, job_id: Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(job_id);
        }
        trace!(job_id = %job_id, "Job enqueued");
        self.notify.notify_one();
    }

    /// Enqueue a job id once `delay` has elapsed.
    pub fn push_after(self: &Arc<Self>, job_id: Uuid, delay: Duration) {
        if delay.is_zero() {
            self.push(job_id);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push(job_id);
        });
    }

    fn try_pop(&self) -> Option<(Uuid, bool)> {
        let mut pending = self.pending.lock().ok()?;
        let job_id = pending.pop_front()?;
        Some((job_id, !pending.is_empty()))
    }

    /// Wait for the next job id.
    pub async fn pop(&self) -> Uuid {
        loop {
            if let Some((job_id, more)) = self.try_pop() {
                // Pass the wakeup on so idle executors drain the backlog.
                if more {
                    self.notify.notify_one();
                }
                return job_id;
            }
            self.notify.notified().await;
        }
    }

    /// Number of ids currently waiting for dispatch.
    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
