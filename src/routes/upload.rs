use axum::extract::Multipart;
use std::path::Path;

use crate::routes::error::ApiError;
use crate::services::storage::{TempVideo, UploadError};

/// Multipart field carrying the uploaded video.
pub const VIDEO_FIELD: &str = "video";

/// Stage the `video` field of a multipart body, skipping any other fields.
pub async fn stage_video_field(
    multipart: &mut Multipart,
    dir: Option<&Path>,
) -> Result<TempVideo, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(VIDEO_FIELD) {
            let video = TempVideo::stage(field, dir).await?;
            tracing::debug!(
                path = %video.path().display(),
                size_bytes = video.size(),
                "Staged uploaded video"
            );
            return Ok(video);
        }
    }

    Err(UploadError::MissingField(VIDEO_FIELD).into())
}
