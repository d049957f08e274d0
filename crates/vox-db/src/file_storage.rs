//! File storage for uploaded media and transcript text.
//!
//! Uploads are written as `{upload_folder}/{timestamp}_{sanitized-name}` and
//! transcripts as `{transcription_folder}/{job_id}.txt`. All writes are atomic
//! (temp file + rename) and land with 0644 permissions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use vox_core::{sanitize_filename, Error, Result};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend rooted at a single directory.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute location of a relative storage path.
    pub fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the backend can write, read, and delete files.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_file = self.base_path.join(".health-check");

        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", self.base_path, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, full_path = %full_path.display(), size = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_storage: File::create failed");
            e
        })?;
        file.write_all(data).await.map_err(|e| {
            warn!(error = %e, "file_storage: write_all failed");
            e
        })?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        // Set permissions to 0644 (rw-r--r--, no execute)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("file {}", full_path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        Ok(fs::try_exists(full_path).await?)
    }
}

/// Storage name for an upload: `{YYYYmmdd_HHMMSS_micros}_{sanitized}`.
pub fn upload_storage_name(original_name: &str) -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S_%6f"),
        sanitize_filename(original_name)
    )
}

/// Storage name for a job transcript.
pub fn transcript_storage_name(job_id: Uuid) -> String {
    format!("{}.txt", job_id)
}

/// Upload and transcript folders used by the job pipeline.
#[derive(Debug, Clone)]
pub struct FileStorage {
    uploads: FilesystemBackend,
    transcripts: FilesystemBackend,
}

impl FileStorage {
    pub fn new(upload_folder: impl Into<PathBuf>, transcription_folder: impl Into<PathBuf>) -> Self {
        Self {
            uploads: FilesystemBackend::new(upload_folder),
            transcripts: FilesystemBackend::new(transcription_folder),
        }
    }

    /// Check both folders at startup.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        self.uploads.validate().await?;
        self.transcripts.validate().await
    }

    /// Persist an upload and return its stored path.
    pub async fn save_upload(&self, original_name: &str, data: &[u8]) -> Result<PathBuf> {
        let name = upload_storage_name(original_name);
        self.uploads.write(&name, data).await?;
        Ok(self.uploads.full_path(&name))
    }

    pub async fn read_upload(&self, stored_path: &Path) -> Result<Vec<u8>> {
        let name = self.upload_name(stored_path)?;
        self.uploads.read(&name).await
    }

    pub async fn delete_upload(&self, stored_path: &Path) -> Result<()> {
        let name = self.upload_name(stored_path)?;
        self.uploads.delete(&name).await
    }

    /// Write the transcript for a job and return its path.
    pub async fn write_transcript(&self, job_id: Uuid, text: &str) -> Result<PathBuf> {
        let name = transcript_storage_name(job_id);
        self.transcripts.write(&name, text.as_bytes()).await?;
        Ok(self.transcripts.full_path(&name))
    }

    pub async fn read_transcript(&self, job_id: Uuid) -> Result<String> {
        let data = self.transcripts.read(&transcript_storage_name(job_id)).await?;
        String::from_utf8(data).map_err(|e| Error::Internal(format!("transcript is not UTF-8: {}", e)))
    }

    pub async fn delete_transcript(&self, job_id: Uuid) -> Result<()> {
        self.transcripts
            .delete(&transcript_storage_name(job_id))
            .await
    }

    /// Uploads are addressed by file name within the upload folder only.
    fn upload_name(&self, stored_path: &Path) -> Result<String> {
        stored_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidInput(format!("invalid upload path {}", stored_path.display()))
            })
    }
}
