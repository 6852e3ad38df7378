use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a video counting job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Allowed edges: queued -> processing -> {completed, failed}.
    /// Re-asserting the current non-terminal status is a no-op.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Queued)
                | (Processing, Processing)
                | (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

/// Outcome of counting the target label across the sampled frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResult {
    pub apple_count: u64,
    pub frames_processed: u64,
    pub total_frames: u64,
}

/// A video counting job as held by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<CountResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Staged upload backing this job. Cleared once the runner releases it.
    #[serde(skip)]
    pub video_path: Option<PathBuf>,
}

impl Job {
    pub fn new(job_id: Uuid, video_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            video_path: Some(video_path),
        }
    }
}

/// Partial update merged into a job record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub result: Option<CountResult>,
    pub error: Option<String>,
    pub clear_video_path: bool,
}

/// Number of jobs currently in each status.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_terminal_states_absorb() {
        for next in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_skipping_processing_to_complete() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(JobStatus::from_str("failed").unwrap(), JobStatus::Failed);
        assert_eq!(
            serde_json::to_value(JobStatus::Queued).unwrap(),
            serde_json::json!("queued")
        );
    }

    #[test]
    fn test_job_serialization_hides_video_path() {
        let job = Job::new(Uuid::new_v4(), PathBuf::from("/tmp/upload.mp4"));
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["status"], "queued");
        assert_eq!(value["progress"], 0);
        assert!(value["result"].is_null());
        assert!(value.get("error").is_none());
        assert!(value.get("video_path").is_none());
    }
}
