//! Submission and job read endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vox_core::{FileType, JobSource, UrlType};
use vox_jobs::{JobView, SessionJobs};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: Uuid,
    pub filename: String,
    pub file_type: FileType,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UrlSubmitResponse {
    pub job_id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_type: Option<UrlType>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub summary: String,
    pub key_topics: Option<String>,
    pub original_length: usize,
    pub summary_length: usize,
}

/// Accept a multipart upload in the `file` field.
pub async fn upload(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if filename.trim().is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }

    let job = state
        .scheduler
        .submit_file(session.id(), &filename, &data)
        .await?;
    let file_type = match &job.source {
        JobSource::File { file_type, .. } => *file_type,
        JobSource::Url { .. } => {
            return Err(ApiError::Internal(vox_core::Error::Internal(
                "upload produced a URL job".to_string(),
            )))
        }
    };
    info!(
        job_id = %job.job_id,
        session_id = %session.id(),
        filename = %filename,
        size = data.len(),
        "Upload accepted"
    );

    Ok(Json(UploadResponse {
        job_id: job.job_id,
        filename,
        file_type,
        message: "File uploaded and queued for transcription".to_string(),
    }))
}

/// Queue a URL for direct download.
pub async fn transcribe_url(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<UrlSubmitResponse>, ApiError> {
    let url = requested_url(body)?;
    let job = state.scheduler.submit_url(session.id(), &url).await?;

    Ok(Json(UrlSubmitResponse {
        job_id: job.job_id,
        url,
        url_type: None,
        message: "URL queued for transcription".to_string(),
    }))
}

/// Queue a platform URL (YouTube, LinkedIn, Google Drive, direct media).
pub async fn enhanced_url(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<UrlSubmitResponse>, ApiError> {
    let url = requested_url(body)?;
    let job = state
        .scheduler
        .submit_enhanced_url(session.id(), &url)
        .await?;
    let url_type = match &job.source {
        JobSource::Url { url_type, .. } => *url_type,
        JobSource::File { .. } => None,
    };
    let label = url_type.map(|t| t.label()).unwrap_or("URL");

    Ok(Json(UrlSubmitResponse {
        job_id: job.job_id,
        url,
        url_type,
        message: format!("{label} URL queued for transcription"),
    }))
}

pub async fn list_transcriptions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SessionJobs>, ApiError> {
    Ok(Json(state.scheduler.list(session.id()).await?))
}

pub async fn job_status(
    State(state): State<AppState>,
    session: Session,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let record = state.scheduler.job(session.id(), job_id).await?;
    Ok(Json(JobView::from(&record)))
}

/// Summarize a completed transcript and store the result on the job.
pub async fn summarize(
    State(state): State<AppState>,
    session: Session,
    Path(job_id): Path<String>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let result = state.scheduler.summarize(session.id(), job_id).await?;

    Ok(Json(SummarizeResponse {
        success: true,
        job_id,
        summary: result.summary,
        key_topics: result.key_topics,
        original_length: result.original_length,
        summary_length: result.summary_length,
    }))
}

/// Serve a completed transcript as a text attachment.
pub async fn download(
    State(state): State<AppState>,
    session: Session,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let transcript = state.scheduler.download(session.id(), job_id).await?;
    let disposition = format!("attachment; filename=\"{}\"", transcript.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        transcript.content,
    )
        .into_response())
}

/// Forget every job of the calling session.
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = state.scheduler.reset(session.id()).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Session reset; {cleared} job(s) cleared"),
    })))
}

fn requested_url(body: Result<Json<UrlRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::BadRequest("No URL provided".to_string()))?;
    let url = request
        .url
        .ok_or_else(|| ApiError::BadRequest("No URL provided".to_string()))?;
    let url = url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("Invalid URL".to_string()));
    }
    Ok(url.to_string())
}

/// Malformed ids can never name a job, so they read as unknown.
fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Job not found".to_string()))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".to_string())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
