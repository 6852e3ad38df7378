use garde::Validate;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// Cloudflare account ID
    #[garde(length(min = 1))]
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    #[garde(length(min = 1))]
    pub cf_api_token: String,

    /// Workers AI object-detection model
    #[serde(default = "default_detection_model")]
    #[garde(length(min = 1))]
    pub detection_model: String,

    /// Detections scoring below this are discarded by the detector.
    #[serde(default = "default_min_confidence")]
    #[garde(range(min = 0.0, max = 1.0))]
    pub min_confidence: f32,

    /// Approximate number of frames inspected per submitted job.
    #[serde(default = "default_target_samples")]
    #[garde(range(min = 1, max = 1000))]
    pub target_samples: u64,

    /// Maximum number of jobs processed at the same time.
    #[serde(default = "default_worker_concurrency")]
    #[garde(range(min = 1, max = 64))]
    pub worker_concurrency: usize,

    /// Upper bound on request bodies, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    #[garde(range(min = 1))]
    pub max_upload_bytes: usize,

    #[serde(default = "default_ffmpeg_path")]
    #[garde(length(min = 1))]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe_path")]
    #[garde(length(min = 1))]
    pub ffprobe_path: String,

    /// Directory for staged uploads. Falls back to the system temp dir.
    #[serde(default)]
    #[garde(skip)]
    pub upload_dir: Option<PathBuf>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_detection_model() -> String {
    "@cf/facebook/detr-resnet-50".to_string()
}

fn default_min_confidence() -> f32 {
    0.25
}

fn default_target_samples() -> u64 {
    10
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
