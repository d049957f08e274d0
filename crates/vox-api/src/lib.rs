//! # vox-api
//!
//! HTTP surface for vox: uploads and URL submissions go in, job projections,
//! summaries and transcript downloads come out. Every route runs under a
//! cookie session and only sees that session's jobs.

pub mod config;
pub mod error;
pub mod handlers;
pub mod session;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

pub use config::ApiConfig;
pub use error::ApiError;
pub use session::Session;
pub use state::AppState;

use handlers::{jobs, system};

/// UUIDv7 request ids, sortable by arrival time.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = uuid::Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &ApiConfig) -> Router {
    let api = Router::new()
        .route("/api/upload", post(jobs::upload))
        .route("/api/transcribe-url", post(jobs::transcribe_url))
        .route("/api/enhanced-url", post(jobs::enhanced_url))
        .route("/api/transcriptions", get(jobs::list_transcriptions))
        .route("/api/job-status/:job_id", get(jobs::job_status))
        .route("/api/summarize/:job_id", post(jobs::summarize))
        .route("/api/download/:job_id", get(jobs::download))
        .route("/api/reset", post(jobs::reset))
        .route("/api/status", get(system::session_status))
        .route("/api/dependencies", get(system::dependencies))
        .route("/api/ffmpeg-status", get(system::ffmpeg_status))
        .layer(axum::middleware::from_fn(session::session_middleware));

    Router::new()
        .route("/health", get(system::health_check))
        .merge(api)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.cors_origins()))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit()))
        .with_state(state)
}
