use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{
    counter::TARGET_LABEL, decoder::VideoDecoder, detector::Detector, job_store::JobStore,
    pipeline::Pipeline, queue::JobQueue,
};

/// Shared application state passed to all route handlers and job runners.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub queue: JobQueue,
    pub pipeline: Pipeline,
    pub target_samples: u64,
    pub upload_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        detector: Arc<dyn Detector>,
        queue: JobQueue,
        target_samples: u64,
        upload_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            jobs: Arc::new(JobStore::new()),
            queue,
            pipeline: Pipeline::new(decoder, detector, TARGET_LABEL),
            target_samples,
            upload_dir,
        }
    }
}
