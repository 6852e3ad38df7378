use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::video::ErrorResponse;
use crate::services::job_store::StoreError;
use crate::services::pipeline::PipelineError;
use crate::services::storage::UploadError;

/// Error returned by route handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Job not found")]
    JobNotFound,

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::JobNotFound => StatusCode::NOT_FOUND,
            ApiError::Upload(UploadError::UnsupportedType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Upload(UploadError::Stream(e)) => e.status(),
            ApiError::Upload(UploadError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::JobNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::JobNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::JobNotFound.to_string(), "Job not found");
        assert_eq!(
            ApiError::from(UploadError::Empty).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(UploadError::MissingField("video")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(UploadError::UnsupportedType("image/png".into())).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::from(StoreError::NotFound(uuid::Uuid::new_v4())).status(),
            StatusCode::NOT_FOUND
        );
    }
}
