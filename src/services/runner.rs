use std::time::Instant;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::Job;
use crate::services::job_store::{JobStore, StoreError};
use crate::services::pipeline::ProgressSink;
use crate::services::queue::QueuedJob;
use crate::services::sampler::SamplingPlan;
use crate::services::storage::TempVideo;

/// Writes pipeline progress into the job store.
struct StoreProgress<'a> {
    store: &'a JobStore,
    job_id: Uuid,
}

impl ProgressSink for StoreProgress<'_> {
    fn on_progress(&self, percent: u8, frames_processed: u64) {
        if let Err(e) = self.store.set_progress(self.job_id, percent) {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to record progress");
        }
        tracing::debug!(job_id = %self.job_id, progress = percent, frames_processed, "Job progress");
    }
}

/// Run one job to a terminal state.
///
/// Pipeline failures are recorded on the job rather than returned; the only
/// error left is a job record that is missing or already terminal. The
/// staged upload is released exactly once on every path.
pub async fn run_job(state: &AppState, job: QueuedJob) -> Result<Job, StoreError> {
    let QueuedJob { job_id, video } = job;
    let started = Instant::now();

    let outcome = execute(state, job_id, &video).await;
    finalize(state, job_id, video);

    let elapsed = started.elapsed();
    metrics::histogram!("video_job_processing_seconds").record(elapsed.as_secs_f64());

    match &outcome {
        Ok(job) => tracing::info!(
            job_id = %job_id,
            status = %job.status,
            duration_ms = elapsed.as_millis() as u64,
            "Job finished"
        ),
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Job could not be tracked"),
    }
    outcome
}

async fn execute(state: &AppState, job_id: Uuid, video: &TempVideo) -> Result<Job, StoreError> {
    state.jobs.mark_processing(job_id)?;
    tracing::info!(job_id = %job_id, size_bytes = video.size(), "Processing video job");

    let progress = StoreProgress {
        store: &state.jobs,
        job_id,
    };
    let plan = SamplingPlan::Budget(state.target_samples);

    match state.pipeline.count(video.path(), plan, &progress).await {
        Ok(result) => {
            metrics::counter!("video_jobs_completed_total").increment(1);
            tracing::info!(
                job_id = %job_id,
                apple_count = result.apple_count,
                frames_processed = result.frames_processed,
                total_frames = result.total_frames,
                "Counting complete"
            );
            state.jobs.complete(job_id, result)
        }
        Err(e) => {
            metrics::counter!("video_jobs_failed_total").increment(1);
            tracing::warn!(job_id = %job_id, error = %e, "Job failed");
            state.jobs.fail(job_id, e.to_string())
        }
    }
}

/// Release the staged upload. A cleanup failure is logged and counted but
/// never changes the recorded outcome.
fn finalize(state: &AppState, job_id: Uuid, video: TempVideo) {
    if let Err(e) = video.release() {
        metrics::counter!("temp_cleanup_failures_total").increment(1);
        tracing::warn!(job_id = %job_id, error = %e, "Failed to delete staged video");
    }
    if let Err(e) = state.jobs.clear_video_path(job_id) {
        tracing::debug!(job_id = %job_id, error = %e, "Job record gone before cleanup");
    }
}
