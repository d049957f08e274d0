//! vox HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vox_api::{router, ApiConfig, AppState};
use vox_db::{Database, FileStorage, MemoryJobRepository};
use vox_inference::{
    FfmpegSplitter, MediaFetcher, MediaProbe, OpenAISummarizer, PlatformFetcher,
    SummarizationBackend, TranscriptionBackend, UnconfiguredTranscription, WhisperBackend,
};
use vox_jobs::{
    Chunking, FileTranscribeHandler, JobScheduler, RetryPolicy, UrlTranscribeHandler,
    WorkerBuilder, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vox_api=debug,vox_jobs=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("vox-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env();

    // Storage
    let files = FileStorage::new(&config.upload_folder, &config.transcription_folder);
    if let Err(e) = files.validate().await {
        anyhow::bail!("storage folders are not usable: {e}");
    }
    let db = Database::with_repository(Arc::new(MemoryJobRepository::new()), files);

    // Collaborators
    let transcriber: Arc<dyn TranscriptionBackend> = match WhisperBackend::from_env() {
        Some(backend) => {
            info!(model = backend.model_name(), "Transcription backend configured");
            Arc::new(backend)
        }
        None => {
            warn!("No transcription backend configured; jobs will fail until one is set");
            Arc::new(UnconfiguredTranscription)
        }
    };
    let summarizer: Option<Arc<dyn SummarizationBackend>> = match OpenAISummarizer::from_env()? {
        Some(s) => Some(Arc::new(s) as Arc<dyn SummarizationBackend>),
        None => {
            warn!("OPENAI_API_KEY not set; summarization is disabled");
            None
        }
    };
    let fetcher: Arc<dyn MediaFetcher> = Arc::new(PlatformFetcher::from_env());
    let probe = MediaProbe::from_env();
    if !probe.is_available().await {
        warn!("ffprobe not found; uploads will not carry media metadata");
    }
    let chunking = Chunking::new(Arc::new(FfmpegSplitter::from_env(probe.clone())));

    // Worker pool
    let policy = RetryPolicy::from_env();
    let worker = WorkerBuilder::new(db.clone())
        .with_config(WorkerConfig::from_env())
        .with_policy(policy.clone())
        .with_handler(
            FileTranscribeHandler::new(transcriber.clone(), db.files.clone())
                .with_chunking(chunking.clone()),
        )
        .with_handler(
            UrlTranscribeHandler::new(transcriber.clone(), fetcher.clone())
                .with_chunking(chunking),
        )
        .build()
        .await;
    let worker_handle = worker.start();

    let mut scheduler = JobScheduler::new(db, fetcher.clone())
        .with_policy(policy)
        .with_max_upload_bytes(config.max_content_length)
        .with_probe(probe.clone());
    if let Some(ref summarizer) = summarizer {
        scheduler = scheduler.with_summarizer(summarizer.clone());
    }
    let mut state = AppState::new(scheduler, transcriber, fetcher).with_probe(probe);
    if let Some(summarizer) = summarizer {
        state = state.with_summarizer(summarizer);
    }

    let app = router(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
        })
        .await?;

    worker_handle.shutdown().await?;
    info!("Shutdown complete");
    Ok(())
}
