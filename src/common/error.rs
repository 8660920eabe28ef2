use crate::common::response::ApiError;
use crate::common::upload::UploadError;
use crate::workers::transcoder::OrchestratorError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Failures of the compression service, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("File exceeds the maximum upload size of {0} bytes")]
    PayloadTooLarge(u64),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OrchestratorError> for ServiceError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Saturated(_) | OrchestratorError::Closed => {
                ServiceError::Unavailable(e.to_string())
            }
            OrchestratorError::NotFound(_) => ServiceError::NotFound("Job not found".to_string()),
            OrchestratorError::AlreadyFinished(..) => ServiceError::Conflict(e.to_string()),
        }
    }
}

impl From<UploadError> for ServiceError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotVideo => ServiceError::Validation(e.to_string()),
            UploadError::TooLarge { limit } => ServiceError::PayloadTooLarge(limit),
            UploadError::Stream(_) => ServiceError::Validation(e.to_string()),
            UploadError::Io(io) => ServiceError::Internal(anyhow::Error::new(io).context("Failed to store upload")),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = e.status();
        match e {
            ServiceError::Internal(inner) => {
                error!("Internal error: {:#}", inner);
                ApiError("Internal server error".to_string(), status)
            }
            other => ApiError(other.to_string(), status),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
