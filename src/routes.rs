use utoipa::OpenApi;
use crate::docs::ApiDoc;
use axum::{routing::get, Json, Router};
use crate::state::AppState;

use tower_http::cors::{Any, CorsLayer};

pub fn configure_routes(state: &AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .merge(crate::modules::compression::router(&state.config))
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
