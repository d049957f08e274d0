//! Session registry: which jobs each client session owns.
//!
//! A job belongs to exactly one session for its whole life. A session is
//! registered by its first job and dropped again on reset; the job records
//! themselves are collected by the caller once nothing references them.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<String, Vec<Uuid>>,
    owners: HashMap<Uuid, String>,
}

/// Mapping from session ids to their job ids, in submission order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Registry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an opaque id for a new session.
    pub fn new_session_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Attach a job to a session, creating the session on first use.
    pub async fn link(&self, session_id: &str, job_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .push(job_id);
        inner.owners.insert(job_id, session_id.to_string());
    }

    /// Job ids owned by the session, oldest first.
    pub async fn job_ids(&self, session_id: &str) -> Vec<Uuid> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the given session currently owns the job.
    pub async fn owns(&self, session_id: &str, job_id: Uuid) -> bool {
        self.inner
            .read()
            .await
            .owners
            .get(&job_id)
            .is_some_and(|owner| owner == session_id)
    }

    /// Whether any session still references the job.
    pub async fn is_linked(&self, job_id: Uuid) -> bool {
        self.inner.read().await.owners.contains_key(&job_id)
    }

    /// Forget the session and return the job ids it released.
    pub async fn reset(&self, session_id: &str) -> Vec<Uuid> {
        let mut inner = self.inner.write().await;
        let Some(released) = inner.sessions.remove(session_id) else {
            return Vec::new();
        };
        for job_id in &released {
            inner.owners.remove(job_id);
        }
        debug!(session_id = %session_id, released = released.len(), "Session reset");
        released
    }

    /// Number of sessions that currently own jobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
