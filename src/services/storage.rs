use axum::extract::multipart::{Field, MultipartError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

/// An uploaded video staged on local disk.
///
/// The file belongs to exactly one job (or one blocking request) and is
/// deleted by [`TempVideo::release`], which consumes the handle. Dropping an
/// unreleased handle also deletes the file.
#[derive(Debug)]
pub struct TempVideo {
    path: TempPath,
    size: u64,
}

impl TempVideo {
    /// Stream a multipart field to a new `.mp4` temp file under `dir`
    /// (or the system temp dir).
    pub async fn stage(mut field: Field<'_>, dir: Option<&Path>) -> Result<Self, UploadError> {
        if let Some(content_type) = field.content_type() {
            if !is_video_content_type(content_type) {
                return Err(UploadError::UnsupportedType(content_type.to_string()));
            }
        }

        let (file, path) = new_temp_file(dir)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(UploadError::Stream)? {
            file.write_all(&chunk).await.map_err(UploadError::Io)?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(UploadError::Io)?;

        Self::finish(path, size)
    }

    /// Stage an in-memory buffer. Used where the body is already collected.
    pub fn from_bytes(bytes: &[u8], dir: Option<&Path>) -> Result<Self, UploadError> {
        let mut file = new_temp_file(dir)?;
        file.write_all(bytes).map_err(UploadError::Io)?;
        file.flush().map_err(UploadError::Io)?;
        Self::finish(file.into_temp_path(), bytes.len() as u64)
    }

    /// Dropping `path` on an empty upload deletes the file.
    fn finish(path: TempPath, size: u64) -> Result<Self, UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the staged file. A file that is already gone counts as released.
    pub fn release(self) -> std::io::Result<()> {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Staged video was already removed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn new_temp_file(dir: Option<&Path>) -> Result<NamedTempFile, UploadError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(".mp4");
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    file.map_err(UploadError::Io)
}

/// Accept `video/*` and the generic binary type browsers fall back to.
pub fn is_video_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("video/") || essence == "application/octet-stream"
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Missing multipart field '{0}'")]
    MissingField(&'static str),

    #[error("Uploaded video is empty")]
    Empty,

    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Failed to read upload: {0}")]
    Stream(#[source] MultipartError),

    #[error("Failed to stage upload: {0}")]
    Io(#[source] std::io::Error),
}
