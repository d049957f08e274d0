//! Job record model and its state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// =============================================================================
// JOB STATUS
// =============================================================================

/// Lifecycle status of a job record.
///
/// Allowed transitions: `queued → processing → {completed | queued | failed}`.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Queued)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// JOB SOURCE
// =============================================================================

/// Platform a submitted URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlType {
    GoogleDrive,
    Linkedin,
    Youtube,
    DirectMedia,
    Unknown,
}

impl UrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::GoogleDrive => "google_drive",
            UrlType::Linkedin => "linkedin",
            UrlType::Youtube => "youtube",
            UrlType::DirectMedia => "direct_media",
            UrlType::Unknown => "unknown",
        }
    }

    /// Human-readable platform name.
    pub fn label(&self) -> &'static str {
        match self {
            UrlType::GoogleDrive => "Google Drive",
            UrlType::Linkedin => "LinkedIn",
            UrlType::Youtube => "YouTube",
            UrlType::DirectMedia => "Direct Media",
            UrlType::Unknown => "Unknown",
        }
    }

    /// Platforms that can only be fetched through the external downloader.
    pub fn requires_downloader(&self) -> bool {
        matches!(self, UrlType::Youtube | UrlType::Linkedin)
    }
}

/// How a URL submission is resolved before transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Fetch the URL directly.
    Basic,
    /// Detect the hosting platform and fetch through its downloader.
    Enhanced,
}

/// Broad media category of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Video,
}

/// Discriminant of [`JobSource`], used to route jobs to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Url,
}

/// Where the media for a job comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobSource {
    File {
        filename: String,
        stored_path: PathBuf,
        file_type: FileType,
    },
    Url {
        url: String,
        resolved_via: Resolution,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url_type: Option<UrlType>,
    },
}

impl JobSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            JobSource::File { .. } => SourceKind::File,
            JobSource::Url { .. } => SourceKind::Url,
        }
    }

    /// Display name used in listings and download file names.
    pub fn display_name(&self) -> String {
        match self {
            JobSource::File { filename, .. } => filename.clone(),
            JobSource::Url {
                url,
                url_type: Some(url_type),
                ..
            } => format!("{} - {}", url_type.label(), url),
            JobSource::Url { url, .. } => format!("URL: {}", url),
        }
    }
}

// =============================================================================
// MEDIA & RESULTS
// =============================================================================

/// Media probe metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub formatted_duration: String,
    pub size_bytes: u64,
    pub format_name: String,
    pub bit_rate: u64,
    pub has_audio: bool,
    pub has_video: bool,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Stored outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub transcription: String,
    /// Byte length of `transcription`.
    pub transcription_length: usize,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
    pub model: Option<String>,
    /// On-disk copy of the transcript, when persisted.
    pub transcript_path: Option<PathBuf>,
    pub transcribed_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub key_topics: Option<String>,
    pub summary_length: Option<usize>,
    pub summarized_at: Option<DateTime<Utc>>,
}

impl TranscriptResult {
    pub fn new(transcription: String) -> Self {
        Self {
            transcription_length: transcription.len(),
            transcription,
            language: None,
            duration_secs: None,
            model: None,
            transcript_path: None,
            transcribed_at: Utc::now(),
            summary: None,
            key_topics: None,
            summary_length: None,
            summarized_at: None,
        }
    }
}

/// Outcome of a summarize request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub key_topics: Option<String>,
    /// Byte length of the summarized transcript.
    pub original_length: usize,
    /// Byte length of `summary`.
    pub summary_length: usize,
}

// =============================================================================
// JOB RECORD
// =============================================================================

/// One submission and its lifecycle.
///
/// All status changes go through the transition methods below, which enforce
/// the state machine and the result/error invariants in a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub session_id: String,
    pub source: JobSource,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    pub result: Option<TranscriptResult>,
    pub media: Option<MediaInfo>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a queued record with a fresh job id.
    pub fn new(session_id: impl Into<String>, source: JobSource, max_retries: u32) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            session_id: session_id.into(),
            source,
            status: JobStatus::Queued,
            attempt_count: 0,
            max_retries: max_retries.max(1),
            error: None,
            result: None,
            media: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_media(mut self, media: Option<MediaInfo>) -> Self {
        self.media = media;
        self
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "job {} cannot move from {} to {}",
                self.job_id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// `queued → processing`; counts the attempt and clears the previous error.
    pub fn claim(&mut self) -> Result<()> {
        if self.attempt_count >= self.max_retries {
            return Err(Error::InvalidState(format!(
                "job {} has used all {} attempts",
                self.job_id, self.max_retries
            )));
        }
        self.transition(JobStatus::Processing)?;
        self.attempt_count += 1;
        self.error = None;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `processing → completed`.
    pub fn complete(&mut self, result: TranscriptResult) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `processing → queued` after a failed attempt that will be retried.
    pub fn requeue(&mut self, error: impl Into<String>) -> Result<()> {
        if self.attempt_count >= self.max_retries {
            return Err(Error::InvalidState(format!(
                "job {} has no attempts left to requeue",
                self.job_id
            )));
        }
        self.transition(JobStatus::Queued)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// `processing → failed` (terminal).
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Augment the result of a completed job with a summary. Status is unchanged.
    pub fn attach_summary(&mut self, summary: &SummaryResult) -> Result<()> {
        let job_id = self.job_id;
        let status = self.status;
        let result = match (status, self.result.as_mut()) {
            (JobStatus::Completed, Some(result)) => result,
            _ => {
                return Err(Error::InvalidState(format!(
                    "job {} is {}, summaries need a completed transcription",
                    job_id, status
                )))
            }
        };
        result.summary = Some(summary.summary.clone());
        result.key_topics = summary.key_topics.clone();
        result.summary_length = Some(summary.summary_length);
        result.summarized_at = Some(Utc::now());
        Ok(())
    }

    /// Transcript text, if the job has completed.
    pub fn transcription(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.transcription.as_str())
    }
}

/// Per-session aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl SessionStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        records
            .into_iter()
            .fold(SessionStats::default(), |mut stats, record| {
                match record.status {
                    JobStatus::Queued => stats.queued += 1,
                    JobStatus::Processing => stats.processing += 1,
                    JobStatus::Completed => stats.completed += 1,
                    JobStatus::Failed => stats.failed += 1,
                }
                stats.total += 1;
                stats
            })
    }
}
