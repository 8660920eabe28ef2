use super::model::{Job, JobStatus, QualityTier};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub job_id: Uuid,
    pub message: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub quality: QualityTier,
    pub original_file_name: String,
    pub original_size: u64,
    pub compressed_size: Option<u64>,
    /// File name of the compressed output, without its directory
    pub output_file_name: Option<String>,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<OffsetDateTime>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let output_file_name = job.output_file_name();
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            quality: job.quality,
            original_file_name: job.original_file_name,
            original_size: job.original_size,
            compressed_size: job.compressed_size,
            output_file_name,
            error: job.error_message,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Multipart form accepted by `POST /compress`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CompressForm {
    #[schema(value_type = String, format = Binary)]
    pub video: Vec<u8>,
    /// Defaults to `balanced`
    pub quality: Option<QualityTier>,
}
