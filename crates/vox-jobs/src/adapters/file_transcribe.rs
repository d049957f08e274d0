//! FileTranscribe handler - transcribes uploaded files via the transcription backend.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use vox_core::{detect_content_type, Error, JobSource, Result, SourceKind, TranscriptResult};
use vox_db::FileStorage;
use vox_inference::TranscriptionBackend;

use super::{transcript_from, Chunking};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Handler for jobs whose media was uploaded.
///
/// Reads the stored upload, detects its content type from magic bytes and
/// extension, and sends it to the transcription backend, in chunks when it
/// is larger than one request allows.
pub struct FileTranscribeHandler {
    backend: Arc<dyn TranscriptionBackend>,
    files: FileStorage,
    chunking: Chunking,
}

impl FileTranscribeHandler {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, files: FileStorage) -> Self {
        Self {
            backend,
            files,
            chunking: Chunking::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = chunking;
        self
    }

    async fn transcribe(&self, ctx: &JobContext) -> Result<TranscriptResult> {
        let (filename, stored_path) = match ctx.source() {
            JobSource::File {
                filename,
                stored_path,
                ..
            } => (filename, stored_path),
            other => {
                return Err(Error::InvalidInput(format!(
                    "file handler received a {:?} source",
                    other.kind()
                )))
            }
        };

        let data = self.files.read_upload(stored_path).await?;
        let mime_type = detect_content_type(filename, &data);
        debug!(
            job_id = %ctx.job_id(),
            filename = %filename,
            mime_type = %mime_type,
            size = data.len(),
            "Transcribing upload"
        );

        let output = self
            .chunking
            .transcribe(
                self.backend.as_ref(),
                ctx.job_id(),
                &data,
                filename,
                &mime_type,
            )
            .await?;
        Ok(transcript_from(output, self.backend.model_name()))
    }
}

#[async_trait]
impl JobHandler for FileTranscribeHandler {
    fn source_kind(&self) -> SourceKind {
        SourceKind::File
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        self.transcribe(&ctx).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::{ErrorClass, FileType, JobRecord, Resolution};
    use vox_inference::mock::{MockSplitter, MockStep, MockTranscriptionBackend};

    fn file_job(stored_path: std::path::PathBuf) -> JobRecord {
        JobRecord::new(
            "session",
            JobSource::File {
                filename: "talk.mp3".to_string(),
                stored_path,
                file_type: FileType::Audio,
            },
            3,
        )
    }

    #[tokio::test]
    async fn test_transcribes_stored_upload() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStorage::new(dir.path().join("u"), dir.path().join("t"));
        let path = files.save_upload("talk.mp3", b"ID3\x03fake").await.unwrap();

        let backend = MockTranscriptionBackend::succeeding("hello there");
        let handler = FileTranscribeHandler::new(Arc::new(backend.clone()), files);

        match handler.execute(JobContext::new(file_job(path))).await {
            JobResult::Success(t) => {
                assert_eq!(t.transcription, "hello there");
                assert_eq!(t.transcription_length, 11);
                assert_eq!(t.model.as_deref(), Some("mock-whisper"));
            }
            JobResult::Failed(e) => panic!("unexpected failure: {}", e),
        }
        assert_eq!(backend.mime_types(), vec!["audio/mpeg".to_string()]);
    }

    #[tokio::test]
    async fn test_large_upload_is_transcribed_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStorage::new(dir.path().join("u"), dir.path().join("t"));
        let mut audio = b"ID3\x03".to_vec();
        audio.resize(3000, 0);
        let path = files.save_upload("lecture.mp3", &audio).await.unwrap();

        let splitter = MockSplitter::new();
        let backend = MockTranscriptionBackend::new(vec![
            MockStep::Text("Chapter one.".to_string()),
            MockStep::Text("Chapter two.".to_string()),
            MockStep::Text("Chapter three.".to_string()),
        ]);
        let handler = FileTranscribeHandler::new(Arc::new(backend.clone()), files)
            .with_chunking(Chunking::new(Arc::new(splitter.clone())).with_limits(1024, 1000));

        match handler.execute(JobContext::new(file_job(path))).await {
            JobResult::Success(t) => {
                assert_eq!(t.transcription, "Chapter one. Chapter two. Chapter three.");
                assert_eq!(t.duration_secs, Some(3.0));
            }
            JobResult::Failed(e) => panic!("unexpected failure: {}", e),
        }
        assert_eq!(splitter.calls(), 1);
        assert_eq!(backend.calls(), 3);
        assert!(backend.mime_types().iter().all(|m| m == "audio/mpeg"));
    }

    #[tokio::test]
    async fn test_missing_upload_is_not_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStorage::new(dir.path().join("u"), dir.path().join("t"));
        let handler = FileTranscribeHandler::new(
            Arc::new(MockTranscriptionBackend::succeeding("x")),
            files,
        );

        let result = handler
            .execute(JobContext::new(file_job(dir.path().join("u/gone.mp3"))))
            .await;
        match result {
            JobResult::Failed(e) => assert_eq!(e.class(), ErrorClass::ValidationError),
            JobResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStorage::new(dir.path().join("u"), dir.path().join("t"));
        let path = files.save_upload("a.wav", b"RIFFdata").await.unwrap();
        let handler = FileTranscribeHandler::new(
            Arc::new(MockTranscriptionBackend::new(vec![MockStep::Unavailable])),
            files,
        );

        match handler.execute(JobContext::new(file_job(path))).await {
            JobResult::Failed(e) => assert_eq!(e.class(), ErrorClass::ServiceUnavailable),
            JobResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_rejects_url_source() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileTranscribeHandler::new(
            Arc::new(MockTranscriptionBackend::succeeding("x")),
            FileStorage::new(dir.path().join("u"), dir.path().join("t")),
        );
        let job = JobRecord::new(
            "session",
            JobSource::Url {
                url: "https://example.com/a.mp3".to_string(),
                resolved_via: Resolution::Basic,
                url_type: None,
            },
            3,
        );
        assert!(!handler.execute(JobContext::new(job)).await.is_success());
    }
}
