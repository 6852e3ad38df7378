use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod detect;
pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod upload;

/// API routes with the shared middleware stack.
///
/// CORS is fully permissive so browser clients on any origin can upload.
/// Uploads are capped by `max_upload_bytes` instead of axum's default limit.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/submit_video", post(jobs::submit_video))
        .route("/submit_video/", post(jobs::submit_video))
        .route("/job_status/{job_id}", get(jobs::job_status))
        .route("/detect_apples", post(detect::detect_apples))
        .route("/detect_apples/", post(detect::detect_apples))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
