//! Executor pool that drives queued jobs through their lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use vox_core::defaults::{EVENT_BUS_CAPACITY, JOB_MAX_CONCURRENT, JOB_TIMEOUT_SECS};
use vox_core::{Error, JobRecord, SourceKind, TranscriptResult};
use vox_db::Database;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::retry::{RetryDecision, RetryPolicy};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of executor tasks.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
    /// Deadline for a single attempt.
    pub job_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: JOB_MAX_CONCURRENT,
            enabled: true,
            job_timeout: Duration::from_secs(JOB_TIMEOUT_SECS),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Executor tasks |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-attempt deadline |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(JOB_MAX_CONCURRENT)
            .max(1);

        let job_timeout = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(JOB_TIMEOUT_SECS));

        Self {
            max_concurrent_jobs,
            enabled,
            job_timeout,
        }
    }

    /// Set the number of executor tasks.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the per-attempt deadline.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// An attempt started.
    JobStarted { job_id: Uuid, attempt: u32 },
    /// An attempt failed and the job was requeued.
    JobRetrying {
        job_id: Uuid,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, attempt: u32 },
    /// A job failed permanently.
    JobFailed {
        job_id: Uuid,
        attempt: u32,
        error: String,
    },
    /// An unreachable job was dropped with its files.
    JobDiscarded { job_id: Uuid },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
///
/// Dropping the handle also stops the executors.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    event_tx: broadcast::Sender<WorkerEvent>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Signal the executors to stop and wait for in-flight attempts to finish.
    pub async fn shutdown(&self) -> vox_core::Result<()> {
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        if tasks.is_empty() {
            return Ok(());
        }
        for task in tasks {
            task.await
                .map_err(|e| Error::Internal(format!("Executor task failed: {}", e)))?;
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

type HandlerMap = HashMap<SourceKind, Arc<dyn JobHandler>>;

/// Job worker that processes jobs from the dispatch queue.
pub struct JobWorker {
    db: Database,
    config: WorkerConfig,
    policy: RetryPolicy,
    handlers: RwLock<HandlerMap>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(db: Database, config: WorkerConfig, policy: RetryPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            db,
            config,
            policy,
            handlers: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn the executor pool and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_tx = self.event_tx.clone();
        let event_rx = self.event_tx.subscribe();
        let mut tasks = Vec::new();

        if self.config.enabled {
            let executors = self.config.max_concurrent_jobs.max(1);
            info!(
                max_concurrent = executors,
                job_timeout_secs = self.config.job_timeout.as_secs(),
                max_retries = self.policy.max_retries,
                "Job worker started"
            );
            let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

            let worker = Arc::new(self);
            for slot in 0..executors {
                let worker = Arc::clone(&worker);
                let shutdown_rx = shutdown_rx.clone();
                tasks.push(tokio::spawn(async move {
                    worker.run(slot, shutdown_rx).await;
                }));
            }
        } else {
            info!("Job worker is disabled, not starting");
        }

        WorkerHandle {
            shutdown_tx,
            event_tx,
            event_rx,
            tasks: Mutex::new(tasks),
        }
    }

    /// Executor loop: pop, claim, execute, repeat until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, slot: usize, mut shutdown_rx: watch::Receiver<bool>) {
        debug!("Executor started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                job_id = self.db.queue.pop() => self.process(job_id).await,
            }
        }
        debug!("Executor stopped");
    }

    async fn process(&self, job_id: Uuid) {
        // Reset may have unlinked the job while it waited in the queue
        if !self.db.sessions.is_linked(job_id).await {
            self.discard(job_id).await;
            return;
        }

        let job = match self.db.jobs.claim(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(job_id = %job_id, "Job is no longer queued, skipping");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to claim job");
                return;
            }
        };

        self.execute_job(job).await;

        if !self.db.sessions.is_linked(job_id).await {
            self.discard(job_id).await;
        }
    }

    /// Run one attempt of a claimed job and record its outcome.
    async fn execute_job(&self, job: JobRecord) {
        let start = Instant::now();
        let job_id = job.job_id;
        let attempt = job.attempt_count;
        let max_retries = job.max_retries;
        let kind = job.source.kind();

        info!(
            job_id = %job_id,
            session_id = %job.session_id,
            attempt,
            max_retries,
            source = %job.source.display_name(),
            "Processing job"
        );
        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, attempt });

        let handler = self.handlers.read().await.get(&kind).cloned();
        let result = match handler {
            Some(handler) => {
                // Each attempt runs in its own task so a panic surfaces as a JoinError
                let timeout = self.config.job_timeout;
                let ctx = JobContext::new(job);
                let mut task = tokio::spawn(async move { handler.execute(ctx).await });
                match tokio::time::timeout(timeout, &mut task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        error!(job_id = %job_id, attempt, error = ?e, "Job task panicked");
                        JobResult::Failed(Error::Internal(format!("Job task panicked: {}", e)))
                    }
                    Err(_) => {
                        task.abort();
                        warn!(
                            job_id = %job_id,
                            attempt,
                            "Job exceeded timeout of {}s",
                            timeout.as_secs()
                        );
                        JobResult::Failed(Error::Timeout(format!(
                            "Job exceeded timeout of {}s",
                            timeout.as_secs()
                        )))
                    }
                }
            }
            None => {
                warn!(?kind, "No handler registered for source kind");
                JobResult::Failed(Error::Config(format!(
                    "No handler for source kind: {:?}",
                    kind
                )))
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            JobResult::Success(transcript) => {
                self.record_success(job_id, attempt, transcript, duration_ms)
                    .await
            }
            JobResult::Failed(error) => {
                self.record_failure(job_id, attempt, max_retries, error, duration_ms)
                    .await
            }
        }
    }

    async fn record_success(
        &self,
        job_id: Uuid,
        attempt: u32,
        mut transcript: TranscriptResult,
        duration_ms: u64,
    ) {
        match self
            .db
            .files
            .write_transcript(job_id, &transcript.transcription)
            .await
        {
            Ok(path) => transcript.transcript_path = Some(path),
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to persist transcript file"),
        }

        let length = transcript.transcription_length;
        match self.db.jobs.complete(job_id, transcript).await {
            Ok(_) => {
                info!(
                    job_id = %job_id,
                    attempt,
                    transcription_length = length,
                    duration_ms,
                    "Job completed successfully"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::JobCompleted { job_id, attempt });
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to mark job as completed");
                let _ = self.db.files.delete_transcript(job_id).await;
            }
        }
    }

    async fn record_failure(
        &self,
        job_id: Uuid,
        attempt: u32,
        max_retries: u32,
        error: Error,
        duration_ms: u64,
    ) {
        let class = error.class();
        let message = error.to_string();

        match self.policy.decide(attempt, class) {
            RetryDecision::Retry { delay } if attempt < max_retries => {
                match self.db.jobs.requeue(job_id, &message).await {
                    Ok(_) => {
                        let delay_ms = delay.as_millis() as u64;
                        warn!(
                            job_id = %job_id,
                            attempt,
                            error_class = %class,
                            delay_ms,
                            error = %message,
                            "Job attempt failed, retrying"
                        );
                        self.db.queue.push_after(job_id, delay);
                        let _ = self.event_tx.send(WorkerEvent::JobRetrying {
                            job_id,
                            attempt,
                            delay_ms,
                            error: message,
                        });
                    }
                    Err(e) => error!(job_id = %job_id, error = %e, "Failed to requeue job"),
                }
            }
            _ => match self.db.jobs.fail(job_id, &message).await {
                Ok(_) => {
                    warn!(
                        job_id = %job_id,
                        attempt,
                        error_class = %class,
                        error = %message,
                        duration_ms,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        attempt,
                        error: message,
                    });
                }
                Err(e) => error!(job_id = %job_id, error = %e, "Failed to mark job as failed"),
            },
        }
    }

    /// Drop a job that no session can reach anymore.
    async fn discard(&self, job_id: Uuid) {
        match self.db.purge(job_id).await {
            Ok(Some(record)) => {
                info!(job_id = %job_id, status = %record.status, "Discarded unreachable job");
                let _ = self.event_tx.send(WorkerEvent::JobDiscarded { job_id });
            }
            Ok(None) => {}
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to discard job"),
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    db: Database,
    config: WorkerConfig,
    policy: RetryPolicy,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            config: WorkerConfig::default(),
            policy: RetryPolicy::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.db, self.config, self.policy);
        {
            let mut handlers = worker.handlers.write().await;
            for handler in self.handlers {
                let kind = handler.source_kind();
                debug!(?kind, "Registered job handler");
                handlers.insert(kind, Arc::from(handler));
            }
        }
        worker
    }
}
