use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Room for multipart boundaries, headers and base64 expansion of JSON bodies.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_image = state.config.scan.max_image_bytes;
    let body_limit = max_image + max_image / 3 + BODY_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handlers::health_check))
        .route("/ping", get(handlers::health_check))
        .route("/scan", post(handlers::scan_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
