use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobStatus;

/// Response after submitting a video for asynchronous counting.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Response of the blocking detection endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub apple_count: u64,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
