//! Submission, summarization and session-level operations.
//!
//! The scheduler is the request-path half of the engine: it validates
//! submissions, creates records, links them to sessions and enqueues them for
//! the executor pool. Every read goes through the caller's session, so a job
//! owned by another session is indistinguishable from an unknown one.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vox_core::defaults::MAX_CONTENT_LENGTH;
use vox_core::{
    sanitize_filename, validate_upload, Error, JobRecord, JobSource, JobStatus, Resolution,
    Result, SessionStats, SummaryResult, UrlType,
};
use vox_db::Database;
use vox_inference::{
    detect_url_type, validate_url, MediaFetcher, MediaProbe, SummarizationBackend,
    YTDLP_INSTALL_COMMAND,
};

use crate::retry::RetryPolicy;
use crate::status::{SessionJobs, SessionStatus};

/// A transcript ready to be served as a file.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptDownload {
    pub filename: String,
    pub content: String,
}

/// Accepts submissions and serves session-scoped reads.
#[derive(Clone)]
pub struct JobScheduler {
    db: Database,
    policy: RetryPolicy,
    max_upload_bytes: u64,
    fetcher: Arc<dyn MediaFetcher>,
    summarizer: Option<Arc<dyn SummarizationBackend>>,
    probe: Option<MediaProbe>,
}

impl JobScheduler {
    pub fn new(db: Database, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            db,
            policy: RetryPolicy::default(),
            max_upload_bytes: MAX_CONTENT_LENGTH,
            fetcher,
            summarizer: None,
            probe: None,
        }
    }

    /// Attempts granted to new jobs come from the policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn SummarizationBackend>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Probe uploads for media metadata before queueing them.
    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn has_summarizer(&self) -> bool {
        self.summarizer.is_some()
    }

    // -------------------------------------------------------------------------
    // Submissions
    // -------------------------------------------------------------------------

    /// Validate and store an upload, then queue it for transcription.
    pub async fn submit_file(
        &self,
        session_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<JobRecord> {
        let file_type = validate_upload(filename, data, self.max_upload_bytes)?;
        let stored_path = self.db.files.save_upload(filename, data).await?;

        let media = match &self.probe {
            Some(probe) => match probe.probe(&stored_path).await {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!(filename, error = %e, "Media probe skipped");
                    None
                }
            },
            None => None,
        };

        let source = JobSource::File {
            filename: filename.to_string(),
            stored_path,
            file_type,
        };
        self.enqueue(session_id, source, media).await
    }

    /// Queue a URL to be downloaded directly.
    pub async fn submit_url(&self, session_id: &str, url: &str) -> Result<JobRecord> {
        let parsed = validate_url(url)?;
        let source = JobSource::Url {
            url: parsed.to_string(),
            resolved_via: Resolution::Basic,
            url_type: None,
        };
        self.enqueue(session_id, source, None).await
    }

    /// Queue a URL fetched through its platform's downloader.
    ///
    /// Fails with `MissingDependency` when the platform needs a tool that is
    /// not installed; no record is created in that case.
    pub async fn submit_enhanced_url(&self, session_id: &str, url: &str) -> Result<JobRecord> {
        let parsed = validate_url(url)?;
        let url_type = detect_url_type(&parsed);
        if url_type == UrlType::Unknown {
            return Err(Error::InvalidInput(
                "Unsupported URL type. Supported platforms: Google Drive, LinkedIn, YouTube, and direct media links"
                    .to_string(),
            ));
        }

        if let Some(tool) = self
            .fetcher
            .missing_dependencies(url_type)
            .await
            .into_iter()
            .next()
        {
            return Err(Error::MissingDependency {
                tool,
                install_command: YTDLP_INSTALL_COMMAND.to_string(),
            });
        }

        let source = JobSource::Url {
            url: parsed.to_string(),
            resolved_via: Resolution::Enhanced,
            url_type: Some(url_type),
        };
        self.enqueue(session_id, source, None).await
    }

    async fn enqueue(
        &self,
        session_id: &str,
        source: JobSource,
        media: Option<vox_core::MediaInfo>,
    ) -> Result<JobRecord> {
        let record = JobRecord::new(session_id, source, self.policy.max_retries).with_media(media);
        let job_id = record.job_id;

        self.db.jobs.insert(record.clone()).await?;
        self.db.sessions.link(session_id, job_id).await;
        self.db.queue.push(job_id);

        info!(
            job_id = %job_id,
            session_id,
            source = %record.source.display_name(),
            "Job queued"
        );
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Session-scoped reads
    // -------------------------------------------------------------------------

    /// One job, if the session owns it.
    pub async fn job(&self, session_id: &str, job_id: Uuid) -> Result<JobRecord> {
        if !self.db.sessions.owns(session_id, job_id).await {
            return Err(Error::JobNotFound(job_id));
        }
        self.db
            .jobs
            .get(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))
    }

    async fn records(&self, session_id: &str) -> Result<Vec<JobRecord>> {
        let ids = self.db.sessions.job_ids(session_id).await;
        self.db.jobs.get_many(&ids).await
    }

    /// In-flight and completed jobs of a session.
    pub async fn list(&self, session_id: &str) -> Result<SessionJobs> {
        let records = self.records(session_id).await?;
        Ok(SessionJobs::from_records(&records))
    }

    /// Counts per status for a session.
    pub async fn stats(&self, session_id: &str) -> Result<SessionStatus> {
        let records = self.records(session_id).await?;
        Ok(SessionStatus {
            session_id: session_id.to_string(),
            stats: SessionStats::from_records(&records),
        })
    }

    /// Transcript text and download name of a completed job.
    pub async fn download(&self, session_id: &str, job_id: Uuid) -> Result<TranscriptDownload> {
        let record = self.job(session_id, job_id).await?;
        let Some(text) = record.transcription() else {
            return Err(Error::InvalidState(format!(
                "job {} is {}, no transcript to download",
                job_id, record.status
            )));
        };

        let content = match self.db.files.read_transcript(job_id).await {
            Ok(content) => content,
            Err(e) => {
                debug!(job_id = %job_id, error = %e, "Serving transcript from record");
                text.to_string()
            }
        };

        let stem = match &record.source {
            JobSource::File { filename, .. } => filename.clone(),
            source => source.display_name(),
        };
        Ok(TranscriptDownload {
            filename: format!("{}_transcription.txt", sanitize_filename(&stem)),
            content,
        })
    }

    // -------------------------------------------------------------------------
    // Summaries and reset
    // -------------------------------------------------------------------------

    /// Summarize a completed transcript and attach the result to the job.
    ///
    /// No lock is held while the summarizer runs.
    pub async fn summarize(&self, session_id: &str, job_id: Uuid) -> Result<SummaryResult> {
        let record = self.job(session_id, job_id).await?;
        if record.status != JobStatus::Completed {
            return Err(Error::InvalidState(format!(
                "job {} is {}, only completed transcriptions can be summarized",
                job_id, record.status
            )));
        }
        let summarizer = self.summarizer.as_ref().ok_or_else(|| {
            Error::ServiceUnavailable("No summarization backend configured".to_string())
        })?;
        let text = record.transcription().unwrap_or_default();

        let (summary, key_topics) = tokio::join!(
            summarizer.summarize(text),
            summarizer.extract_key_topics(text)
        );
        let summary = summary?;
        let key_topics = match key_topics {
            Ok(topics) => Some(topics),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Key topic extraction failed");
                None
            }
        };

        let result = SummaryResult {
            original_length: text.len(),
            summary_length: summary.len(),
            summary,
            key_topics,
        };
        self.db.jobs.attach_summary(job_id, &result).await?;

        info!(
            job_id = %job_id,
            session_id,
            original_length = result.original_length,
            summary_length = result.summary_length,
            "Transcription summarized"
        );
        Ok(result)
    }

    /// Unlink every job from the session and drop the ones no longer running.
    ///
    /// Jobs still processing finish their attempt and are dropped by the
    /// executor afterwards. Returns the number of jobs unlinked.
    pub async fn reset(&self, session_id: &str) -> Result<usize> {
        let ids = self.db.sessions.reset(session_id).await;
        let records = self.db.jobs.get_many(&ids).await?;

        let purges = records
            .iter()
            .filter(|r| r.status != JobStatus::Processing)
            .map(|r| self.db.purge(r.job_id));
        for outcome in join_all(purges).await {
            if let Err(e) = outcome {
                warn!(session_id, error = %e, "Failed to purge job on reset");
            }
        }

        info!(session_id, jobs = ids.len(), "Session reset");
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::{ErrorClass, TranscriptResult};
    use vox_inference::mock::{MockFetcher, MockSummarizer};

    fn scheduler(dir: &tempfile::TempDir) -> JobScheduler {
        let db = Database::in_memory(dir.path().join("uploads"), dir.path().join("transcripts"));
        JobScheduler::new(db, Arc::new(MockFetcher::succeeding()))
    }

    async fn complete(scheduler: &JobScheduler, job_id: Uuid, text: &str) {
        let db = scheduler.database();
        db.jobs.claim(job_id).await.unwrap().unwrap();
        db.jobs
            .complete(job_id, TranscriptResult::new(text.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_file_queues_job() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);

        let record = s
            .submit_file("sess", "meeting.mp3", b"ID3 audio bytes")
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.attempt_count, 0);
        assert_eq!(record.max_retries, 3);
        assert!(s.database().sessions.owns("sess", record.job_id).await);
        assert_eq!(s.database().queue.len(), 1);
        match &record.source {
            JobSource::File { stored_path, .. } => assert!(stored_path.exists()),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_upload_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).with_max_upload_bytes(4);

        for (name, data) in [
            ("notes.txt", b"hello".as_slice()),
            ("empty.mp3", b"".as_slice()),
            ("big.mp3", b"0123456789".as_slice()),
            ("evil.mp3", b"MZ\x90\x00".as_slice()),
        ] {
            let err = s.submit_file("sess", name, data).await.unwrap_err();
            assert!(!err.class().is_retryable(), "{}", name);
            assert!(err.is_validation(), "{}: {}", name, err);
        }
        assert_eq!(s.database().jobs.count().await.unwrap(), 0);
        assert!(s.database().queue.is_empty());
    }

    #[tokio::test]
    async fn test_submit_url_validates() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);

        assert!(matches!(
            s.submit_url("sess", "ftp://example.com/a.mp3").await,
            Err(Error::InvalidInput(_))
        ));
        let record = s
            .submit_url("sess", "https://example.com/a.mp3")
            .await
            .unwrap();
        assert!(matches!(
            record.source,
            JobSource::Url {
                resolved_via: Resolution::Basic,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_enhanced_url_unknown_platform_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let err = s
            .submit_enhanced_url("sess", "https://example.com/page")
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::ValidationError);
        assert_eq!(s.database().jobs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enhanced_url_missing_downloader() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory(dir.path().join("u"), dir.path().join("t"));
        let s = JobScheduler::new(
            db,
            Arc::new(MockFetcher::succeeding().with_missing(&["yt-dlp"])),
        );

        match s
            .submit_enhanced_url("sess", "https://youtu.be/abc123")
            .await
        {
            Err(Error::MissingDependency {
                tool,
                install_command,
            }) => {
                assert_eq!(tool, "yt-dlp");
                assert_eq!(install_command, YTDLP_INSTALL_COMMAND);
            }
            other => panic!("expected missing dependency, got {:?}", other),
        }

        // Drive links do not need the downloader
        let record = s
            .submit_enhanced_url("sess", "https://drive.google.com/file/d/abc/view")
            .await
            .unwrap();
        assert!(matches!(
            record.source,
            JobSource::Url {
                url_type: Some(UrlType::GoogleDrive),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_other_session_cannot_see_job() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let record = s
            .submit_url("alice", "https://example.com/a.mp3")
            .await
            .unwrap();

        assert!(matches!(
            s.job("bob", record.job_id).await,
            Err(Error::JobNotFound(_))
        ));
        assert!(s.list("bob").await.unwrap().is_empty());
        assert!(matches!(
            s.summarize("bob", record.job_id).await,
            Err(Error::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_requires_completed() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).with_summarizer(Arc::new(MockSummarizer::echoing()));
        let record = s
            .submit_url("sess", "https://example.com/a.mp3")
            .await
            .unwrap();

        let err = s.summarize("sess", record.job_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(s.job("sess", record.job_id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_summarize_without_backend() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let record = s
            .submit_url("sess", "https://example.com/a.mp3")
            .await
            .unwrap();
        complete(&s, record.job_id, "some words").await;

        assert!(matches!(
            s.summarize("sess", record.job_id).await,
            Err(Error::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_attaches_result() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).with_summarizer(Arc::new(MockSummarizer::echoing()));
        let record = s
            .submit_url("sess", "https://example.com/a.mp3")
            .await
            .unwrap();
        complete(&s, record.job_id, "quarterly planning meeting notes").await;

        let summary = s.summarize("sess", record.job_id).await.unwrap();
        assert_eq!(summary.summary, "Summary: quarterly planning m");
        assert_eq!(summary.key_topics.as_deref(), Some("- quarterly"));
        assert_eq!(summary.original_length, 32);

        let stored = s.job("sess", record.job_id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        let result = stored.result.unwrap();
        assert_eq!(result.summary.as_deref(), Some(summary.summary.as_str()));
        assert!(result.summarized_at.is_some());
    }

    #[tokio::test]
    async fn test_download_names_and_states() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let record = s
            .submit_file("sess", "Team Sync.mp3", b"ID3 audio")
            .await
            .unwrap();

        assert!(matches!(
            s.download("sess", record.job_id).await,
            Err(Error::InvalidState(_))
        ));

        complete(&s, record.job_id, "hello team").await;
        let download = s.download("sess", record.job_id).await.unwrap();
        assert_eq!(download.filename, "Team_Sync.mp3_transcription.txt");
        assert_eq!(download.content, "hello team");
    }

    #[tokio::test]
    async fn test_reset_unlinks_and_purges() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let done = s
            .submit_file("sess", "a.mp3", b"ID3 audio")
            .await
            .unwrap();
        complete(&s, done.job_id, "done").await;
        s.database()
            .files
            .write_transcript(done.job_id, "done")
            .await
            .unwrap();

        let running = s
            .submit_url("sess", "https://example.com/b.mp3")
            .await
            .unwrap();
        s.database().jobs.claim(running.job_id).await.unwrap();

        assert_eq!(s.reset("sess").await.unwrap(), 2);
        assert!(s.list("sess").await.unwrap().is_empty());
        assert_eq!(s.stats("sess").await.unwrap().stats.total, 0);

        // Completed job and its files are gone; the running one is left to its executor
        assert!(s.database().jobs.get(done.job_id).await.unwrap().is_none());
        assert!(s.database().jobs.get(running.job_id).await.unwrap().is_some());
        assert!(!s.database().sessions.is_linked(running.job_id).await);
        assert!(matches!(
            s.download("sess", done.job_id).await,
            Err(Error::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_counts_per_status() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir);
        let a = s.submit_url("sess", "https://example.com/a.mp3").await.unwrap();
        s.submit_url("sess", "https://example.com/b.mp3").await.unwrap();
        complete(&s, a.job_id, "x").await;

        let status = s.stats("sess").await.unwrap();
        assert_eq!(status.session_id, "sess");
        assert_eq!(status.stats.completed, 1);
        assert_eq!(status.stats.queued, 1);
        assert_eq!(status.stats.total, 2);
    }
}
