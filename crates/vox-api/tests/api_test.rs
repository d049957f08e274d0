//! Router tests: every endpoint exercised through `oneshot` against scripted
//! collaborators and a temporary storage folder.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vox_api::{router, ApiConfig, AppState};
use vox_db::Database;
use vox_inference::mock::{MockFetcher, MockSummarizer, MockTranscriptionBackend};
use vox_jobs::{
    FileTranscribeHandler, JobScheduler, RetryPolicy, UrlTranscribeHandler, WorkerBuilder,
    WorkerConfig, WorkerHandle,
};

const BOUNDARY: &str = "vox-test-boundary";

struct TestApp {
    app: Router,
    db: Database,
    _handle: WorkerHandle,
    _dir: TempDir,
}

struct Options {
    worker_enabled: bool,
    summarizer: bool,
    fetcher: MockFetcher,
    max_upload_bytes: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            worker_enabled: true,
            summarizer: true,
            fetcher: MockFetcher::succeeding(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

async fn test_app(opts: Options) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory(dir.path().join("uploads"), dir.path().join("transcripts"));
    let backend = Arc::new(MockTranscriptionBackend::succeeding(
        "Thanks for joining the weekly sync.",
    ));
    let fetcher = Arc::new(opts.fetcher);
    let policy = RetryPolicy::default()
        .with_delays(Duration::from_millis(5), Duration::from_millis(20));

    let worker = WorkerBuilder::new(db.clone())
        .with_config(
            WorkerConfig::default()
                .with_max_concurrent(2)
                .with_enabled(opts.worker_enabled),
        )
        .with_policy(policy.clone())
        .with_handler(FileTranscribeHandler::new(backend.clone(), db.files.clone()))
        .with_handler(UrlTranscribeHandler::new(backend.clone(), fetcher.clone()))
        .build()
        .await;
    let handle = worker.start();

    let mut scheduler = JobScheduler::new(db.clone(), fetcher.clone())
        .with_policy(policy)
        .with_max_upload_bytes(opts.max_upload_bytes);
    let mut state = AppState::new(scheduler.clone(), backend, fetcher);
    if opts.summarizer {
        let summarizer = Arc::new(MockSummarizer::echoing());
        scheduler = scheduler.with_summarizer(summarizer.clone());
        state = state.with_summarizer(summarizer);
    }
    state.scheduler = scheduler;

    let config = ApiConfig {
        max_content_length: opts.max_upload_bytes,
        ..ApiConfig::default()
    };

    TestApp {
        app: router(state, &config),
        db,
        _handle: handle,
        _dir: dir,
    }
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: &str) -> Reply {
        let request = Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn post_json(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        let request = Request::post(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post_empty(&self, uri: &str, cookie: &str) -> Reply {
        let request = Request::post(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn upload(&self, cookie: &str, field: &str, filename: &str, data: &[u8]) -> Reply {
        let request = Request::post("/api/upload")
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, data)))
            .unwrap();
        self.send(request).await
    }

    /// Poll the status endpoint until the job leaves the queue for good.
    async fn wait_terminal(&self, cookie: &str, job_id: &str) -> Value {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let reply = self.get(&format!("/api/job-status/{job_id}"), cookie).await;
                assert_eq!(reply.status, StatusCode::OK);
                let view = reply.json();
                if view["status"] == "completed" || view["status"] == "failed" {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish in time")
    }
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn mp3_bytes(len: usize) -> Vec<u8> {
    let mut data = b"ID3\x03\x00\x00\x00".to_vec();
    data.resize(len, 0);
    data
}

const ALICE: &str = "vox_session=alice0000000000000000000000000001";
const BOB: &str = "vox_session=bob00000000000000000000000000000002";

#[tokio::test]
async fn test_health_needs_no_session() {
    let app = test_app(Options::default()).await;
    let reply = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "healthy");
    assert!(reply.session_cookie().is_none());
}

#[tokio::test]
async fn test_new_client_gets_session_cookie() {
    let app = test_app(Options::default()).await;

    let first = app
        .send(Request::get("/api/status").body(Body::empty()).unwrap())
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let cookie = first.session_cookie().expect("session cookie issued");
    assert!(cookie.starts_with("vox_session="));
    let session_id = cookie.trim_start_matches("vox_session=").to_string();
    assert_eq!(first.json()["session_id"], session_id);
    assert_eq!(first.json()["total"], 0);

    let second = app.get("/api/status", &cookie).await;
    assert!(second.session_cookie().is_none());
    assert_eq!(second.json()["session_id"], session_id);
}

#[tokio::test]
async fn test_browsing_does_not_register_sessions() {
    let app = test_app(Options::default()).await;

    for i in 0..50 {
        let anonymous = app
            .send(Request::get("/api/status").body(Body::empty()).unwrap())
            .await;
        assert_eq!(anonymous.status, StatusCode::OK);
        let forged = format!("vox_session=forged{i:026}");
        assert_eq!(app.get("/api/transcriptions", &forged).await.status, StatusCode::OK);
    }
    assert!(app.db.sessions.is_empty().await);

    let reply = app.upload(ALICE, "file", "memo.mp3", &mp3_bytes(128)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(app.db.sessions.len().await, 1);

    assert_eq!(app.post_empty("/api/reset", ALICE).await.status, StatusCode::OK);
    assert!(app.db.sessions.is_empty().await);
}

#[tokio::test]
async fn test_upload_transcribe_and_download() {
    let app = test_app(Options::default()).await;

    let reply = app
        .upload(ALICE, "file", "weekly sync.mp3", &mp3_bytes(2 * 1024 * 1024))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["filename"], "weekly sync.mp3");
    assert_eq!(body["file_type"], "audio");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let view = app.wait_terminal(ALICE, &job_id).await;
    assert_eq!(view["status"], "completed");
    assert_eq!(view["transcription"], "Thanks for joining the weekly sync.");
    assert!(view.get("error").is_none());

    let listing = app.get("/api/transcriptions", ALICE).await.json();
    assert_eq!(listing["transcriptions"].as_array().unwrap().len(), 1);
    assert!(listing["processing_jobs"].as_array().unwrap().is_empty());

    let download = app.get(&format!("/api/download/{job_id}"), ALICE).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.headers[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let disposition = download.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"weekly_sync.mp3_transcription.txt\""
    );
    assert_eq!(download.body, b"Thanks for joining the weekly sync.");

    let status = app.get("/api/status", ALICE).await.json();
    assert_eq!(status["completed"], 1);
    assert_eq!(status["total"], 1);
    assert_eq!(status["ffmpeg_available"], false);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = test_app(Options {
        max_upload_bytes: 4096,
        ..Options::default()
    })
    .await;

    let wrong_field = app.upload(ALICE, "attachment", "a.mp3", &mp3_bytes(64)).await;
    assert_eq!(wrong_field.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_field.json()["error"], "No file provided");

    let bad_ext = app.upload(ALICE, "file", "setup.exe", b"MZ\x90\x00").await;
    assert_eq!(bad_ext.status, StatusCode::BAD_REQUEST);

    let empty = app.upload(ALICE, "file", "silence.mp3", b"").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let too_big = app.upload(ALICE, "file", "long.mp3", &mp3_bytes(8192)).await;
    assert_eq!(too_big.status, StatusCode::PAYLOAD_TOO_LARGE);

    let status = app.get("/api/status", ALICE).await.json();
    assert_eq!(status["total"], 0);
}

#[tokio::test]
async fn test_transcribe_url_validation() {
    let app = test_app(Options {
        worker_enabled: false,
        ..Options::default()
    })
    .await;

    let missing = app
        .post_json("/api/transcribe-url", ALICE, serde_json::json!({}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["error"], "No URL provided");

    let malformed = app
        .post_json(
            "/api/transcribe-url",
            ALICE,
            serde_json::json!({ "url": "ftp://example.com/a.mp3" }),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let ok = app
        .post_json(
            "/api/transcribe-url",
            ALICE,
            serde_json::json!({ "url": "https://cdn.example.com/episode-12.mp3" }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    let body = ok.json();
    assert_eq!(body["url"], "https://cdn.example.com/episode-12.mp3");
    assert!(body.get("url_type").is_none());

    let job_id = body["job_id"].as_str().unwrap();
    let view = app.get(&format!("/api/job-status/{job_id}"), ALICE).await.json();
    assert_eq!(view["status"], "queued");
    assert_eq!(view["source"], "url");
}

#[tokio::test]
async fn test_enhanced_url_reports_platform() {
    let app = test_app(Options {
        worker_enabled: false,
        ..Options::default()
    })
    .await;

    let reply = app
        .post_json(
            "/api/enhanced-url",
            ALICE,
            serde_json::json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["url_type"], "youtube");
    assert_eq!(body["message"], "YouTube URL queued for transcription");

    let unknown = app
        .post_json(
            "/api/enhanced-url",
            ALICE,
            serde_json::json!({ "url": "https://example.com/about" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enhanced_url_without_downloader() {
    let app = test_app(Options {
        fetcher: MockFetcher::succeeding().with_missing(&["yt-dlp"]),
        ..Options::default()
    })
    .await;

    let reply = app
        .post_json(
            "/api/enhanced-url",
            ALICE,
            serde_json::json!({ "url": "https://youtu.be/dQw4w9WgXcQ" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = reply.json();
    assert_eq!(body["install_command"], "pip install yt-dlp");
    assert!(body["error"].as_str().unwrap().contains("yt-dlp"));

    let deps = app.get("/api/dependencies", ALICE).await.json();
    assert_eq!(deps["all_dependencies_available"], false);
    assert_eq!(deps["missing_dependencies"][0], "yt-dlp");
    assert_eq!(deps["available_features"]["linkedin_youtube"], false);
    assert_eq!(deps["available_features"]["google_drive"], true);
    assert_eq!(deps["install_command"], "pip install yt-dlp");

    // Direct media needs no downloader.
    let direct = app
        .post_json(
            "/api/enhanced-url",
            ALICE,
            serde_json::json!({ "url": "https://cdn.example.com/talk.mp3" }),
        )
        .await;
    assert_eq!(direct.status, StatusCode::OK);
    assert_eq!(direct.json()["url_type"], "direct_media");
}

#[tokio::test]
async fn test_jobs_are_private_to_their_session() {
    let app = test_app(Options {
        worker_enabled: false,
        ..Options::default()
    })
    .await;

    let reply = app.upload(ALICE, "file", "memo.wav", b"RIFF\x00\x00\x00\x00WAVE").await;
    assert_eq!(reply.status, StatusCode::OK);
    let job_id = reply.json()["job_id"].as_str().unwrap().to_string();

    let as_bob = app.get(&format!("/api/job-status/{job_id}"), BOB).await;
    assert_eq!(as_bob.status, StatusCode::NOT_FOUND);
    let bob_download = app.get(&format!("/api/download/{job_id}"), BOB).await;
    assert_eq!(bob_download.status, StatusCode::NOT_FOUND);
    let bob_list = app.get("/api/transcriptions", BOB).await.json();
    assert!(bob_list["processing_jobs"].as_array().unwrap().is_empty());

    let garbage = app.get("/api/job-status/not-a-job", ALICE).await;
    assert_eq!(garbage.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summarize_and_download_require_completion() {
    let app = test_app(Options {
        worker_enabled: false,
        ..Options::default()
    })
    .await;

    let reply = app.upload(ALICE, "file", "memo.mp3", &mp3_bytes(128)).await;
    let job_id = reply.json()["job_id"].as_str().unwrap().to_string();

    let summarize = app
        .post_empty(&format!("/api/summarize/{job_id}"), ALICE)
        .await;
    assert_eq!(summarize.status, StatusCode::CONFLICT);

    let download = app.get(&format!("/api/download/{job_id}"), ALICE).await;
    assert_eq!(download.status, StatusCode::CONFLICT);

    let view = app.get(&format!("/api/job-status/{job_id}"), ALICE).await.json();
    assert_eq!(view["status"], "queued");
    assert!(view.get("summary").is_none());
}

#[tokio::test]
async fn test_summarize_completed_job() {
    let app = test_app(Options::default()).await;

    let reply = app.upload(ALICE, "file", "memo.mp3", &mp3_bytes(128)).await;
    let job_id = reply.json()["job_id"].as_str().unwrap().to_string();
    app.wait_terminal(ALICE, &job_id).await;

    let summarize = app
        .post_empty(&format!("/api/summarize/{job_id}"), ALICE)
        .await;
    assert_eq!(summarize.status, StatusCode::OK);
    let body = summarize.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["job_id"], job_id.as_str());
    assert_eq!(body["summary"], "Summary: Thanks for joining t");
    assert_eq!(body["key_topics"], "- Thanks");
    assert_eq!(
        body["original_length"],
        "Thanks for joining the weekly sync.".len()
    );

    let view = app.get(&format!("/api/job-status/{job_id}"), ALICE).await.json();
    assert_eq!(view["summary"], "Summary: Thanks for joining t");
}

#[tokio::test]
async fn test_summarize_without_summarizer() {
    let app = test_app(Options {
        summarizer: false,
        ..Options::default()
    })
    .await;

    let reply = app.upload(ALICE, "file", "memo.mp3", &mp3_bytes(128)).await;
    let job_id = reply.json()["job_id"].as_str().unwrap().to_string();
    app.wait_terminal(ALICE, &job_id).await;

    let summarize = app
        .post_empty(&format!("/api/summarize/{job_id}"), ALICE)
        .await;
    assert_eq!(summarize.status, StatusCode::SERVICE_UNAVAILABLE);

    let deps = app.get("/api/dependencies", ALICE).await.json();
    assert_eq!(deps["available_features"]["summarization"], false);
    assert_eq!(deps["available_features"]["transcription"], true);
    assert_eq!(deps["transcription_model"], "mock-whisper");
}

#[tokio::test]
async fn test_reset_clears_session() {
    let app = test_app(Options::default()).await;

    let mut ids = Vec::new();
    for name in ["one.mp3", "two.mp3"] {
        let reply = app.upload(ALICE, "file", name, &mp3_bytes(128)).await;
        let job_id = reply.json()["job_id"].as_str().unwrap().to_string();
        app.wait_terminal(ALICE, &job_id).await;
        ids.push(job_id);
    }
    let bob_reply = app.upload(BOB, "file", "keep.mp3", &mp3_bytes(128)).await;
    let bob_job = bob_reply.json()["job_id"].as_str().unwrap().to_string();

    let reset = app.post_empty("/api/reset", ALICE).await;
    assert_eq!(reset.status, StatusCode::OK);
    assert!(reset.json()["message"].is_string());

    let listing = app.get("/api/transcriptions", ALICE).await.json();
    assert!(listing["transcriptions"].as_array().unwrap().is_empty());
    assert!(listing["processing_jobs"].as_array().unwrap().is_empty());
    for id in &ids {
        let download = app.get(&format!("/api/download/{id}"), ALICE).await;
        assert_eq!(download.status, StatusCode::NOT_FOUND);
    }
    assert_eq!(app.get("/api/status", ALICE).await.json()["total"], 0);

    let bob_view = app.get(&format!("/api/job-status/{bob_job}"), BOB).await;
    assert_eq!(bob_view.status, StatusCode::OK);
}

#[tokio::test]
async fn test_ffmpeg_status_without_probe() {
    let app = test_app(Options::default()).await;
    let reply = app.get("/api/ffmpeg-status", ALICE).await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["ffmpeg_available"], false);
    assert!(body["installation_guide"]["linux"].is_string());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = test_app(Options::default()).await;
    let reply = app.get("/health", ALICE).await;
    let request_id = reply.headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}
