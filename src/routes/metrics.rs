use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the service metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("video_jobs_submitted_total", "Video jobs accepted for processing");
    metrics::describe_counter!("video_jobs_completed_total", "Video jobs that produced a count");
    metrics::describe_counter!("video_jobs_failed_total", "Video jobs that ended in failure");
    metrics::describe_histogram!(
        "video_job_processing_seconds",
        "Time from a worker picking up a job to its terminal state"
    );
    metrics::describe_gauge!("video_queue_depth", "Jobs waiting for a worker");
    metrics::describe_counter!("frames_inferred_total", "Frames sent to the detection model");
    metrics::describe_counter!(
        "sync_detect_requests_total",
        "Requests to the blocking detection endpoint"
    );
    metrics::describe_counter!(
        "temp_cleanup_failures_total",
        "Staged uploads that could not be deleted"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
