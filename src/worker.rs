//! Background worker loop draining the in-process job queue.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::services::queue::{JobReceiver, QueuedJob};
use crate::services::runner;

/// Spawn the worker loop on the current runtime.
pub fn spawn(state: AppState, receiver: JobReceiver, concurrency: usize) -> JoinHandle<()> {
    tokio::spawn(run(state, receiver, concurrency))
}

/// Pull jobs off the queue and run up to `concurrency` of them at once.
///
/// A job is only dequeued once a slot is free, so waiting jobs stay counted
/// in the queue depth.
pub async fn run(state: AppState, mut receiver: JobReceiver, concurrency: usize) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    tracing::info!(concurrency, "Worker ready, waiting for jobs");

    loop {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let Some(job) = receiver.dequeue().await else {
            break;
        };

        tracing::debug!(job_id = %job.job_id, "Dispatching job");
        let state = state.clone();
        tokio::spawn(async move {
            supervise(&state, job).await;
            drop(permit);
        });
    }

    tracing::info!("Job queue closed, worker stopped");
}

/// Run one job, failing it if the runner panics part way through.
///
/// Store errors are already logged by the runner. The staged upload is
/// deleted when the panic unwinds past its handle.
pub async fn supervise(state: &AppState, job: QueuedJob) {
    let job_id = job.job_id;
    let outcome = AssertUnwindSafe(runner::run_job(state, job))
        .catch_unwind()
        .await;

    if let Err(panic) = outcome {
        fail_panicked(state, job_id, panic_message(panic.as_ref()));
    }
}

fn fail_panicked(state: &AppState, job_id: Uuid, message: String) {
    tracing::error!(job_id = %job_id, panic = %message, "Job runner panicked");

    match state.jobs.fail(job_id, format!("job panicked: {message}")) {
        Ok(_) => metrics::counter!("video_jobs_failed_total").increment(1),
        Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Could not fail panicked job"),
    }
    if let Err(e) = state.jobs.clear_video_path(job_id) {
        tracing::debug!(job_id = %job_id, error = %e, "Job record gone before cleanup");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
