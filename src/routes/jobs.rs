use axum::extract::{Multipart, Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{Job, JobStatus};
use crate::models::video::SubmitResponse;
use crate::routes::error::ApiError;
use crate::routes::upload::stage_video_field;
use crate::services::queue::{QueueError, QueuedJob};

/// POST /submit_video/ — Upload a video and queue it for counting.
///
/// Returns as soon as the job is queued; progress is read from
/// `GET /job_status/{job_id}`.
pub async fn submit_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let video = stage_video_field(&mut multipart, state.upload_dir.as_deref()).await?;
    let size_bytes = video.size();
    let job_id = state.jobs.create(video.to_path_buf());

    if let Err(e) = state.queue.enqueue(QueuedJob { job_id, video }) {
        state.jobs.remove(job_id);
        if let QueueError::Closed(job) = &e {
            tracing::error!(job_id = %job.job_id, "Worker unavailable, rejecting upload");
        }
        // Dropping the rejected job deletes its staged file
        return Err(ApiError::Unavailable(e.to_string()));
    }

    metrics::counter!("video_jobs_submitted_total").increment(1);
    tracing::info!(job_id = %job_id, size_bytes, "Video job queued");

    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Queued,
    }))
}

/// GET /job_status/{job_id} — Current state of a job.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| ApiError::JobNotFound)?;
    Ok(Json(state.jobs.get(job_id)?))
}
