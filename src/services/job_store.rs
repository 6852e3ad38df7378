use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::job::{CountResult, Job, JobCounts, JobStatus, JobUpdate};

/// In-memory job registry shared by request handlers and job runners.
///
/// Created once at startup and dropped with the process; nothing is
/// persisted. Every update is applied under a single write lock, so readers
/// see either the old record or the fully merged one.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `queued` job backed by the staged upload at `video_path`.
    pub fn create(&self, video_path: PathBuf) -> Uuid {
        let mut jobs = self.jobs.write();
        let mut job_id = Uuid::new_v4();
        while jobs.contains_key(&job_id) {
            job_id = Uuid::new_v4();
        }
        jobs.insert(job_id, Job::new(job_id, video_path));
        job_id
    }

    pub fn get(&self, job_id: Uuid) -> Result<Job, StoreError> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound(job_id))
    }

    /// Drop a job that was never handed out, e.g. when enqueueing failed.
    pub fn remove(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.write().remove(&job_id)
    }

    /// Merge the named fields into the job.
    ///
    /// Status changes must follow `queued -> processing -> {completed,
    /// failed}`. Progress never decreases and stays below 100 until the job
    /// completes. A result is only kept on completed jobs, an error only on
    /// failed ones.
    pub fn update(&self, job_id: Uuid, update: JobUpdate) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;

        let next_status = update.status.unwrap_or(job.status);
        if update.status.is_some() && !job.status.can_transition_to(next_status) {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: job.status,
                to: next_status,
            });
        }
        let touches_outcome =
            update.progress.is_some() || update.result.is_some() || update.error.is_some();
        if job.status.is_terminal() && touches_outcome {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: job.status,
                to: next_status,
            });
        }
        if update.result.is_some() && next_status != JobStatus::Completed {
            return Err(StoreError::Inconsistent {
                job_id,
                reason: "result requires completed status",
            });
        }
        if update.error.is_some() && next_status != JobStatus::Failed {
            return Err(StoreError::Inconsistent {
                job_id,
                reason: "error requires failed status",
            });
        }
        if next_status == JobStatus::Completed && update.result.is_none() && job.result.is_none() {
            return Err(StoreError::Inconsistent {
                job_id,
                reason: "completed status requires a result",
            });
        }
        if next_status == JobStatus::Failed && update.error.is_none() && job.error.is_none() {
            return Err(StoreError::Inconsistent {
                job_id,
                reason: "failed status requires an error",
            });
        }

        job.status = next_status;
        if let Some(progress) = update.progress {
            job.progress = job.progress.max(progress).min(99);
        }
        if next_status == JobStatus::Completed {
            job.progress = 100;
        }
        if let Some(result) = update.result {
            job.result = Some(result);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        if update.clear_video_path {
            job.video_path = None;
        }
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    pub fn mark_processing(&self, job_id: Uuid) -> Result<Job, StoreError> {
        self.update(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Processing),
                ..Default::default()
            },
        )
    }

    pub fn set_progress(&self, job_id: Uuid, progress: u8) -> Result<Job, StoreError> {
        self.update(
            job_id,
            JobUpdate {
                progress: Some(progress),
                ..Default::default()
            },
        )
    }

    pub fn complete(&self, job_id: Uuid, result: CountResult) -> Result<Job, StoreError> {
        self.update(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Completed),
                result: Some(result),
                ..Default::default()
            },
        )
    }

    pub fn fail(&self, job_id: Uuid, error: impl Into<String>) -> Result<Job, StoreError> {
        self.update(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Failed),
                error: Some(error.into()),
                ..Default::default()
            },
        )
    }

    /// Forget the staged upload path once the runner has released it.
    /// Allowed in any status, including terminal ones.
    pub fn clear_video_path(&self, job_id: Uuid) -> Result<Job, StoreError> {
        self.update(
            job_id,
            JobUpdate {
                clear_video_path: true,
                ..Default::default()
            },
        )
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Inconsistent update for job {job_id}: {reason}")]
    Inconsistent { job_id: Uuid, reason: &'static str },
}
