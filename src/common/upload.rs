use axum::{body::Bytes, extract::multipart::Field, http::StatusCode};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, warn};

pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "3gp"];

const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only video files are allowed!")]
    NotVideo,

    #[error("File exceeds the maximum upload size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Upload stream interrupted: {0}")]
    Stream(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts a file only when its declared type is `video/*` and its name
/// carries a known video extension. Returns the lowercased extension.
pub fn validate_video(file_name: &str, content_type: Option<&str>) -> Result<String, UploadError> {
    let is_video_type = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.type_() == mime::VIDEO);

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| ALLOWED_VIDEO_EXTENSIONS.contains(&e.as_str()));

    match (is_video_type, extension) {
        (true, Some(ext)) => Ok(ext),
        _ => Err(UploadError::NotVideo),
    }
}

/// Buffered writer for one upload that enforces a byte limit.
///
/// The file is removed unless [`finish`](DiskUploader::finish) succeeds, also
/// when the uploader is dropped mid-stream (client disconnect, shutdown).
pub struct DiskUploader {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
    limit: u64,
    armed: bool,
}

impl DiskUploader {
    pub async fn new(path: PathBuf, limit: u64) -> Result<Self, UploadError> {
        let file = File::create(&path).await?;

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            written: 0,
            limit,
            armed: true,
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), UploadError> {
        self.written += chunk.len() as u64;
        if self.written > self.limit {
            return Err(UploadError::TooLarge { limit: self.limit });
        }

        self.writer.write_all(&chunk).await?;
        Ok(())
    }

    /// Flushes to disk and returns the number of bytes stored. On error the
    /// partial file is removed.
    pub async fn finish(mut self) -> Result<u64, UploadError> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        self.armed = false;
        Ok(self.written)
    }

    pub async fn abort(mut self) {
        self.armed = false;
        let path = self.path.clone();
        drop(self);

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "Failed to remove aborted upload: {}", e);
            }
        }
    }
}

impl Drop for DiskUploader {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to remove unfinished upload: {}", e);
            }
        }
    }
}

/// Streams a multipart file field to `path`. On any error the partial file
/// is removed before returning.
pub async fn stream_to_disk(
    mut field: Field<'_>,
    path: PathBuf,
    limit: u64,
) -> Result<u64, UploadError> {
    let mut uploader = DiskUploader::new(path, limit).await?;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let err = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    UploadError::TooLarge { limit }
                } else {
                    error!("Stream error: {}", e);
                    UploadError::Stream(e.body_text())
                };
                uploader.abort().await;
                return Err(err);
            }
        };

        if let Err(e) = uploader.write_chunk(chunk).await {
            uploader.abort().await;
            return Err(e);
        }
    }

    // A failed finish drops the uploader, which removes the partial file.
    match uploader.finish().await {
        Ok(size) => Ok(size),
        Err(e) => {
            error!("Upload error: {}", e);
            Err(e)
        }
    }
}
