use super::dto::{CancelResponse, CompressResponse, JobStatusResponse};
use super::model::{Job, JobStatus, QualityTier};
use crate::common::error::ServiceError;
use crate::common::upload::{stream_to_disk, validate_video};
use crate::infrastructure::storage::DownloadLease;
use crate::state::AppState;
use anyhow::anyhow;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tracing::{info, warn};
use uuid::Uuid;

/// Slack on top of the file limit for multipart boundaries and headers.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

const VIDEO_FIELD: &str = "video";
const QUALITY_FIELD: &str = "quality";

/// A video file written to the uploads directory.
struct StoredUpload {
    path: PathBuf,
    original_file_name: String,
    size: u64,
}

/// An opened compressed file, ready to be streamed. The lease keeps the
/// sweeper away from the file until it is dropped.
pub struct DownloadFile {
    pub file: File,
    pub len: u64,
    pub file_name: String,
    pub lease: DownloadLease,
}

pub struct CompressionService;

impl CompressionService {
    pub async fn intake(
        state: AppState,
        content_length: Option<u64>,
        mut multipart: Multipart,
    ) -> Result<CompressResponse, ServiceError> {
        let limit = state.config.max_upload_bytes;
        if content_length.is_some_and(|len| len > limit.saturating_add(MULTIPART_OVERHEAD)) {
            return Err(ServiceError::PayloadTooLarge(limit));
        }

        let permit = state.orchestrator.reserve()?;
        let job_id = Uuid::new_v4();

        let mut stored: Option<StoredUpload> = None;
        let quality = match Self::read_form(&state, job_id, &mut multipart, &mut stored).await {
            Ok(quality) => quality,
            Err(e) => {
                if let Some(upload) = &stored {
                    state.storage.discard(&upload.path).await;
                }
                return Err(e);
            }
        };

        let Some(upload) = stored else {
            return Err(ServiceError::Validation("No video file uploaded".to_string()));
        };

        let job = Job::new(
            job_id,
            upload.original_file_name.clone(),
            upload.size,
            quality,
            upload.path.clone(),
        );
        if let Err(e) = state.registry.create(job) {
            state.storage.discard(&upload.path).await;
            return Err(anyhow!(e).context("Failed to register job").into());
        }

        if let Err(e) = state.orchestrator.submit_reserved(
            permit,
            job_id,
            upload.path.clone(),
            quality,
            &upload.original_file_name,
        ) {
            let _ = state.registry.delete(&job_id);
            state.storage.discard(&upload.path).await;
            return Err(e.into());
        }

        info!(
            job_id = %job_id,
            file = %upload.original_file_name,
            size = upload.size,
            quality = %quality,
            "Video uploaded"
        );

        let status = state
            .registry
            .snapshot(&job_id)
            .map(|j| j.status)
            .unwrap_or(JobStatus::Pending);

        Ok(CompressResponse {
            job_id,
            message: "Compression started".to_string(),
            status,
        })
    }

    async fn read_form(
        state: &AppState,
        job_id: Uuid,
        multipart: &mut Multipart,
        stored: &mut Option<StoredUpload>,
    ) -> Result<QualityTier, ServiceError> {
        let limit = state.config.max_upload_bytes;
        let mut quality = QualityTier::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                VIDEO_FIELD if stored.is_none() => {
                    let original_file_name = display_name(field.file_name().unwrap_or_default());
                    let extension = validate_video(&original_file_name, field.content_type())?;

                    let path = state.storage.upload_path(job_id, &extension);
                    let size = stream_to_disk(field, path.clone(), limit).await?;

                    *stored = Some(StoredUpload {
                        path,
                        original_file_name,
                        size,
                    });
                }
                QUALITY_FIELD => {
                    let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                    if !value.trim().is_empty() {
                        quality = value.parse().map_err(ServiceError::Validation)?;
                    }
                }
                _ => {
                    warn!(job_id = %job_id, field = %name, "Ignoring unexpected form field");
                }
            }
        }

        Ok(quality)
    }

    pub fn get_status(state: &AppState, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        let id = parse_job_id(job_id)?;
        state
            .registry
            .snapshot(&id)
            .map(JobStatusResponse::from)
            .map_err(|_| job_not_found())
    }

    pub fn cancel(state: &AppState, job_id: &str) -> Result<CancelResponse, ServiceError> {
        let id = parse_job_id(job_id)?;
        let status = state.orchestrator.cancel(id)?;

        Ok(CancelResponse { job_id: id, status })
    }

    /// Opens the compressed output of a completed job. The lease is taken
    /// before the job is looked up so a concurrent sweep cannot remove the
    /// file between the check and the open.
    pub async fn open_download(state: &AppState, job_id: &str) -> Result<DownloadFile, ServiceError> {
        let id = parse_job_id(job_id)?;

        let lease = state
            .downloads
            .acquire(id)
            .ok_or_else(job_not_found)?;

        let job = state.registry.snapshot(&id).map_err(|_| job_not_found())?;

        let output_path = match (&job.status, &job.output_path) {
            (JobStatus::Completed, Some(path)) => path.clone(),
            _ => return Err(ServiceError::NotFound("File not available".to_string())),
        };

        let file = match File::open(&output_path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(job_id = %id, path = %output_path.display(), "Compressed file missing");
                return Err(ServiceError::NotFound("File not found on disk".to_string()));
            }
            Err(e) => return Err(anyhow!(e).context("Failed to open compressed file").into()),
        };

        let len = file
            .metadata()
            .await
            .map_err(|e| anyhow!(e).context("Failed to read compressed file metadata"))?
            .len();

        Ok(DownloadFile {
            file,
            len,
            file_name: job.download_file_name(),
            lease,
        })
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| job_not_found())
}

fn job_not_found() -> ServiceError {
    ServiceError::NotFound("Job not found".to_string())
}

/// Last path component of a client-supplied file name.
fn display_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        return String::new();
    }
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn multipart_error(e: MultipartError, limit: u64) -> ServiceError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(limit)
    } else {
        ServiceError::Validation(format!("Invalid multipart request: {}", e.body_text()))
    }
}
