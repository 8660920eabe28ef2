use super::download::attachment_response;
use super::dto::{CancelResponse, CompressForm, CompressResponse, JobStatusResponse};
use super::service::CompressionService;
use crate::common::response::{ApiError, ApiSuccess, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};

/// Upload a video for compression
/// The file is streamed to disk and encoded in the background; poll the
/// status endpoint with the returned job id.
#[utoipa::path(
    post,
    path = "/compress",
    request_body(content = CompressForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Compression started", body = CompressResponse),
        (status = 400, description = "Not a video, invalid quality or no file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Too many jobs in progress", body = ErrorResponse),
        (status = 500, description = "Upload failed", body = ErrorResponse)
    ),
    tag = "Compression"
)]
pub async fn compress(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> impl IntoResponse {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match CompressionService::intake(state, content_length, multipart).await {
        Ok(res) => ApiSuccess(res, StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/status/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status", body = JobStatusResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    tag = "Compression"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match CompressionService::get_status(&state, &job_id) {
        Ok(res) => ApiSuccess(res, StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Download the compressed video
#[utoipa::path(
    get,
    path = "/download/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Compressed video", content_type = "application/octet-stream"),
        (status = 404, description = "Job unknown, not completed or file missing", body = ErrorResponse)
    ),
    tag = "Compression"
)]
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match CompressionService::open_download(&state, &job_id).await {
        Ok(file) => attachment_response(file),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Cancel a pending or running job
#[utoipa::path(
    post,
    path = "/cancel/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 202, description = "Cancellation accepted", body = CancelResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job already finished", body = ErrorResponse)
    ),
    tag = "Compression"
)]
pub async fn cancel(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match CompressionService::cancel(&state, &job_id) {
        Ok(res) => ApiSuccess(res, StatusCode::ACCEPTED).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
