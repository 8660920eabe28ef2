use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::modules::compression::model::output_path_for;

/// Scratch and output directories on local disk.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    uploads_dir: PathBuf,
    processed_dir: PathBuf,
}

impl LocalStorage {
    pub async fn new(uploads_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let storage = Self {
            uploads_dir: uploads_dir.into(),
            processed_dir: processed_dir.into(),
        };

        tokio::fs::create_dir_all(&storage.uploads_dir).await?;
        tokio::fs::create_dir_all(&storage.processed_dir).await?;

        info!(
            uploads = %storage.uploads_dir.display(),
            processed = %storage.processed_dir.display(),
            "✅ Storage directories ready"
        );

        Ok(storage)
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Scratch path for an upload; the client-supplied name never reaches disk.
    pub fn upload_path(&self, job_id: Uuid, extension: &str) -> PathBuf {
        self.uploads_dir.join(format!("{}.{}", job_id, extension))
    }

    pub fn output_path(&self, job_id: Uuid, original_file_name: &str) -> PathBuf {
        output_path_for(&self.processed_dir, job_id, original_file_name)
    }

    /// Removes a file, treating "already gone" as success.
    /// Returns whether a file was actually deleted.
    pub async fn remove_if_exists(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Like [`remove_if_exists`](Self::remove_if_exists) but logs instead of failing.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = self.remove_if_exists(path).await {
            warn!(path = %path.display(), "Failed to remove file: {}", e);
        }
    }
}
