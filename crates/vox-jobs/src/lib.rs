//! # vox-jobs
//!
//! Asynchronous transcription job engine for vox.
//!
//! This crate provides:
//! - Submission and session-scoped reads via [`JobScheduler`]
//! - A bounded pool of executors consuming the dispatch queue
//! - Retry decisions with capped exponential backoff
//! - Progress notifications via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vox_db::Database;
//! use vox_inference::{PlatformFetcher, WhisperBackend};
//! use vox_jobs::{
//!     FileTranscribeHandler, JobScheduler, RetryPolicy, UrlTranscribeHandler, WorkerBuilder,
//!     WorkerConfig,
//! };
//!
//! let db = Database::in_memory("uploads", "transcriptions");
//! let backend = Arc::new(WhisperBackend::from_env().unwrap());
//! let fetcher = Arc::new(PlatformFetcher::from_env());
//!
//! let worker = WorkerBuilder::new(db.clone())
//!     .with_config(WorkerConfig::from_env())
//!     .with_policy(RetryPolicy::from_env())
//!     .with_handler(FileTranscribeHandler::new(backend.clone(), db.files.clone()))
//!     .with_handler(UrlTranscribeHandler::new(backend, fetcher.clone()))
//!     .build()
//!     .await;
//! let handle = worker.start();
//!
//! let scheduler = JobScheduler::new(db, fetcher);
//! let job = scheduler.submit_url(&session_id, "https://example.com/talk.mp3").await?;
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod handler;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod worker;

// Re-export core types
pub use vox_core::*;

pub use adapters::{Chunking, FileTranscribeHandler, UrlTranscribeHandler};
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{JobScheduler, TranscriptDownload};
pub use status::{JobView, SessionJobs, SessionStatus};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
