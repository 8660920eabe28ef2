use crate::config::settings::AppConfig;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub mod download;
pub mod dto;
pub mod handler;
pub mod model;
pub mod service;

pub fn router(config: &AppConfig) -> Router<AppState> {
    let body_limit: usize = config
        .max_upload_bytes
        .saturating_add(service::MULTIPART_OVERHEAD)
        .try_into()
        .unwrap_or(usize::MAX);

    let upload_routes = Router::new()
        .route("/compress", post(handler::compress))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    Router::new()
        .route("/status/{job_id}", get(handler::get_status))
        .route("/download/{job_id}", get(handler::download))
        .route("/cancel/{job_id}", post(handler::cancel))
        .merge(upload_routes)
}
