use utoipa::OpenApi;
use crate::common::response::ErrorResponse;
use crate::modules::compression::dto::*;
use crate::modules::compression::model::{JobStatus, QualityTier};

#[derive(OpenApi)]
#[openapi(
    info(title = "Video Compressor API", description = "Upload videos, track compression jobs and download the results"),
    paths(
        crate::modules::compression::handler::compress,
        crate::modules::compression::handler::get_status,
        crate::modules::compression::handler::download,
        crate::modules::compression::handler::cancel,
    ),
    components(
        schemas(
            CompressForm, CompressResponse, JobStatusResponse, CancelResponse,
            ErrorResponse, JobStatus, QualityTier,
        )
    ),
    tags(
        (name = "Compression", description = "Video compression jobs")
    )
)]
pub struct ApiDoc;
