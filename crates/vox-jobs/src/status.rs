//! Read-only projections of job records for polling clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use vox_core::{
    FileType, JobRecord, JobSource, JobStatus, MediaInfo, SessionStats, SourceKind, UrlType,
};

/// Caller-facing view of one job.
///
/// Retry bookkeeping stays internal; the only failure detail exposed is the
/// error message of a failed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub source: SourceKind,
    /// Display name: the upload name or a platform-qualified URL.
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_type: Option<UrlType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
    /// Completion time for finished jobs, submission time otherwise.
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_topics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarized_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInfo>,
}

impl From<&JobRecord> for JobView {
    fn from(record: &JobRecord) -> Self {
        let (url, url_type, file_type) = match &record.source {
            JobSource::File { file_type, .. } => (None, None, Some(*file_type)),
            JobSource::Url { url, url_type, .. } => (Some(url.clone()), *url_type, None),
        };
        let result = record.result.as_ref();

        Self {
            job_id: record.job_id,
            status: record.status,
            source: record.source.kind(),
            filename: record.source.display_name(),
            url,
            url_type,
            file_type,
            timestamp: record.completed_at.unwrap_or(record.created_at),
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error: match record.status {
                JobStatus::Failed => record.error.clone(),
                _ => None,
            },
            transcription: result.map(|r| r.transcription.clone()),
            transcription_length: result.map(|r| r.transcription_length),
            language: result.and_then(|r| r.language.clone()),
            summary: result.and_then(|r| r.summary.clone()),
            key_topics: result.and_then(|r| r.key_topics.clone()),
            summary_length: result.and_then(|r| r.summary_length),
            summarized_at: result.and_then(|r| r.summarized_at),
            media: record.media.clone(),
        }
    }
}

/// A session's jobs split into in-flight and completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionJobs {
    /// Queued, processing and failed jobs, in submission order.
    pub processing_jobs: Vec<JobView>,
    /// Completed jobs, in submission order.
    pub transcriptions: Vec<JobView>,
}

impl SessionJobs {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let (transcriptions, processing_jobs): (Vec<JobView>, Vec<JobView>) = records
            .into_iter()
            .map(JobView::from)
            .partition(|view| view.status == JobStatus::Completed);
        Self {
            processing_jobs,
            transcriptions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processing_jobs.is_empty() && self.transcriptions.is_empty()
    }
}

/// Aggregate status for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    #[serde(flatten)]
    pub stats: SessionStats,
}
