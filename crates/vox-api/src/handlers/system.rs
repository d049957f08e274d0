//! Health, session status and dependency reporting.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use vox_core::UrlType;
use vox_jobs::SessionStatus;
use vox_inference::YTDLP_INSTALL_COMMAND;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub ffmpeg_available: bool,
}

/// Job counts for the calling session.
pub async fn session_status(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.scheduler.stats(session.id()).await?;
    Ok(Json(StatusResponse {
        status,
        ffmpeg_available: state.ffprobe_available().await,
    }))
}

#[derive(Debug, Serialize)]
pub struct AvailableFeatures {
    pub google_drive: bool,
    pub linkedin_youtube: bool,
    pub ffmpeg: bool,
    pub transcription: bool,
    pub summarization: bool,
}

#[derive(Debug, Serialize)]
pub struct DependenciesResponse {
    pub all_dependencies_available: bool,
    pub missing_dependencies: Vec<String>,
    pub available_features: AvailableFeatures,
    pub transcription_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarization_model: Option<String>,
    pub install_command: Option<String>,
}

/// Availability of external tools and backends.
pub async fn dependencies(State(state): State<AppState>) -> Json<DependenciesResponse> {
    let missing = state.fetcher.missing_dependencies(UrlType::Youtube).await;
    let transcription = state.transcriber.health_check().await.unwrap_or(false);
    let summarization = match &state.summarizer {
        Some(s) => s.health_check().await.unwrap_or(false),
        None => false,
    };

    Json(DependenciesResponse {
        all_dependencies_available: missing.is_empty(),
        install_command: (!missing.is_empty()).then(|| YTDLP_INSTALL_COMMAND.to_string()),
        available_features: AvailableFeatures {
            google_drive: state
                .fetcher
                .missing_dependencies(UrlType::GoogleDrive)
                .await
                .is_empty(),
            linkedin_youtube: missing.is_empty(),
            ffmpeg: state.ffprobe_available().await,
            transcription,
            summarization,
        },
        missing_dependencies: missing,
        transcription_model: state.transcriber.model_name().to_string(),
        summarization_model: state.summarizer.as_ref().map(|s| s.model_name().to_string()),
    })
}

/// ffprobe availability, with installation hints when it is missing.
pub async fn ffmpeg_status(State(state): State<AppState>) -> impl IntoResponse {
    let available = state.ffprobe_available().await;
    if available {
        return Json(json!({
            "ffmpeg_available": true,
            "message": "FFmpeg is available and ready to use",
        }));
    }

    Json(json!({
        "ffmpeg_available": false,
        "message": "FFmpeg is not installed or not in PATH",
        "installation_guide": {
            "windows": "Download from https://ffmpeg.org/download.html#build-windows and add to PATH",
            "macos": "Install with Homebrew: brew install ffmpeg",
            "linux": "Install with package manager: sudo apt install ffmpeg (Ubuntu/Debian) or sudo yum install ffmpeg (CentOS/RHEL)",
        },
    }))
}
