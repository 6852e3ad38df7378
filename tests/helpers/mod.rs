//! Test doubles and request helpers shared by the integration tests.
#![allow(dead_code)]

use apple_counter::app_state::AppState;
use apple_counter::models::detection::{Detection, Frame};
use apple_counter::services::decoder::{DecodeError, FrameStream, VideoDecoder};
use apple_counter::services::detector::{DetectError, Detector};
use apple_counter::services::queue::{JobQueue, JobReceiver};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::fixtures::{self, VideoFixture};

pub const BOUNDARY: &str = "applecounterboundary";

/// Decoder that replays fixtures named by the staged file's contents.
///
/// Anything that is not a fixture upload is treated as a corrupt container.
#[derive(Default)]
pub struct FakeDecoder {
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub unhealthy: bool,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoDecoder for FakeDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, DecodeError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DecodeError::Open(path.to_path_buf(), e))?;

        let fixture = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.strip_prefix("FAKEVIDEO:"))
            .and_then(fixtures::by_name)
            .ok_or_else(|| DecodeError::Probe("Invalid data found when processing input".into()))?;

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            fixture: fixture.clone(),
            position: 0,
            closed: false,
            closes: Arc::clone(&self.closes),
        }))
    }

    async fn health_check(&self) -> Result<(), DecodeError> {
        if self.unhealthy {
            Err(DecodeError::Exited("ffmpeg not installed".into()))
        } else {
            Ok(())
        }
    }
}

pub struct FakeStream {
    fixture: VideoFixture,
    position: u64,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameStream for FakeStream {
    fn total_frames(&self) -> u64 {
        self.fixture.reported_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Frame pixels encode the scene: byte 0 is the apple count, byte 1 the
    /// number of other objects.
    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.closed || self.position >= self.fixture.frames {
            return Ok(None);
        }
        let index = self.position;
        self.position += 1;

        let mut data = vec![0u8; Frame::byte_len(2, 2)];
        data[0] = self.fixture.apples_at(index);
        data[1] = self.fixture.others_at(index);
        Ok(Some(Frame {
            index,
            width: 2,
            height: 2,
            data,
        }))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Detector reading the scene back out of fake frame pixels.
#[derive(Default)]
pub struct FakeDetector {
    pub calls: Arc<AtomicUsize>,
    /// Fail on this (0-based) call.
    pub fail_on_call: Option<usize>,
    /// Panic on this (0-based) call.
    pub panic_on_call: Option<usize>,
    /// When set, every call waits for a permit.
    pub gate: Option<Arc<Semaphore>>,
}

impl FakeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn panicking_on(call: usize) -> Self {
        Self {
            panic_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| DetectError::Model("gate closed".into()))?
                .forget();
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_call == Some(call) {
            panic!("detector blew up on frame {}", frame.index);
        }
        if self.fail_on_call == Some(call) {
            return Err(DetectError::Model("model crashed".into()));
        }

        let mut detections = Vec::new();
        for _ in 0..frame.data[0] {
            detections.push(Detection::new("apple", 0.9));
        }
        for _ in 0..frame.data[1] {
            detections.push(Detection::new("banana", 0.8));
        }
        Ok(detections)
    }
}

/// State wired to the given fakes, plus the queue's receiving half.
pub fn test_state(decoder: FakeDecoder, detector: FakeDetector) -> (AppState, JobReceiver) {
    let (queue, receiver) = JobQueue::new();
    let state = AppState::new(Arc::new(decoder), Arc::new(detector), queue, 10, None);
    (state, receiver)
}

/// Build a single-file multipart upload.
pub fn multipart_request(uri: &str, field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"clip.mp4\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
