use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::models::detection::{BoundingBox, Detection, Frame};

/// One inference call per frame.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Objects found in `frame`. An empty vector is a valid answer.
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;
}

/// Client for a Cloudflare Workers AI object-detection model.
pub struct WorkersAiDetector {
    http: Client,
    url: String,
    api_token: String,
    min_confidence: f32,
}

#[derive(Serialize)]
struct DetectRequest {
    image: Vec<u8>,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Vec<RawDetection>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct RawDetection {
    label: String,
    score: f32,
    #[serde(rename = "box", default)]
    bbox: Option<BoundingBox>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

impl WorkersAiDetector {
    pub fn new(account_id: &str, api_token: &str, model: &str, min_confidence: f32) -> Self {
        Self {
            http: Client::new(),
            url: format!(
                "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
                account_id, model
            ),
            api_token: api_token.to_string(),
            min_confidence,
        }
    }
}

/// JPEG-encode a raw RGB frame for upload.
pub fn encode_frame(frame: Frame) -> Result<Vec<u8>, DetectError> {
    let Frame {
        index,
        width,
        height,
        data,
    } = frame;
    let len = data.len();
    let image =
        RgbImage::from_raw(width, height, data).ok_or(DetectError::InvalidFrame { index, len })?;

    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .map_err(DetectError::Encode)?;
    Ok(bytes.into_inner())
}

/// [`encode_frame`] on the blocking pool.
pub async fn encode_frame_blocking(frame: &Frame) -> Result<Vec<u8>, DetectError> {
    let frame = frame.clone();
    tokio::task::spawn_blocking(move || encode_frame(frame)).await?
}

fn parse_response(body: &[u8], min_confidence: f32) -> Result<Vec<Detection>, DetectError> {
    let response: DetectResponse = serde_json::from_slice(body).map_err(DetectError::Parse)?;

    if response.success == Some(false) {
        let message = response
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DetectError::Model(message));
    }

    Ok(response
        .result
        .into_iter()
        .filter(|d| d.score >= min_confidence)
        .map(|d| Detection {
            label: d.label,
            confidence: d.score,
            bbox: d.bbox.unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl Detector for WorkersAiDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let request = DetectRequest {
            image: encode_frame_blocking(frame).await?,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(DetectError::Http)?;

        let status = response.status();
        let body = response.bytes().await.map_err(DetectError::Http)?;
        if !status.is_success() {
            return Err(DetectError::Model(format!(
                "HTTP {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        parse_response(&body, self.min_confidence)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Frame {index} has {len} bytes, not a full RGB image")]
    InvalidFrame { index: u64, len: usize },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Frame encoding task failed: {0}")]
    EncodeTask(#[from] tokio::task::JoinError),

    #[error("Detection request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse detection response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Detection model error: {0}")]
    Model(String),
}
