use axum::extract::{Multipart, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::video::DetectResponse;
use crate::routes::error::ApiError;
use crate::routes::upload::stage_video_field;
use crate::services::pipeline::NoProgress;
use crate::services::sampler::SamplingPlan;

/// Every n-th frame is inspected by the blocking endpoint.
pub const SYNC_FRAME_STRIDE: u64 = 5;

/// POST /detect_apples/ — Count apples and answer in the same request.
///
/// Holds the request open for the whole decode and inference run, so it is
/// only suitable for short clips. Failures surface as a 500.
pub async fn detect_apples(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    metrics::counter!("sync_detect_requests_total").increment(1);
    let video = stage_video_field(&mut multipart, state.upload_dir.as_deref()).await?;

    let outcome = state
        .pipeline
        .count(video.path(), SamplingPlan::Fixed(SYNC_FRAME_STRIDE), &NoProgress)
        .await;

    if let Err(e) = video.release() {
        metrics::counter!("temp_cleanup_failures_total").increment(1);
        tracing::warn!(error = %e, "Failed to delete staged video");
    }

    let result = outcome?;
    tracing::info!(
        apple_count = result.apple_count,
        frames_processed = result.frames_processed,
        "Synchronous detection complete"
    );

    Ok(Json(DetectResponse {
        apple_count: result.apple_count,
    }))
}
