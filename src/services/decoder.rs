use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::models::detection::Frame;

/// Opens videos for forward-only frame reading.
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, DecodeError>;

    /// Confirm the decoder backend is usable (for health checks).
    async fn health_check(&self) -> Result<(), DecodeError>;
}

/// A decoded video, read strictly in order.
#[async_trait]
pub trait FrameStream: Send {
    /// Frame count reported by the container, or 0 when unknown.
    fn total_frames(&self) -> u64;

    /// Index the next returned frame will carry.
    fn position(&self) -> u64;

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError>;

    /// Advance past one frame without keeping it. Returns false at end of stream.
    async fn skip_frame(&mut self) -> Result<bool, DecodeError> {
        Ok(self.next_frame().await?.is_some())
    }

    /// Release the underlying decoder. Safe to call more than once.
    async fn close(&mut self);
}

/// Decoder backed by the `ffprobe` and `ffmpeg` executables.
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
}

/// Dimensions and frame count of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub total_frames: u64,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn probe(&self, path: &Path) -> Result<StreamInfo, DecodeError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,nb_frames"])
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DecodeError::Spawn(self.ffprobe.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecodeError::Probe(stderr.trim().to_string()));
        }

        parse_probe_output(&output.stdout)
    }

    async fn version_check(binary: &str) -> Result<(), DecodeError> {
        let status = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| DecodeError::Spawn(binary.to_string(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(DecodeError::Exited(status.to_string()))
        }
    }
}

/// Parse `ffprobe -of json` output for the first video stream.
pub fn parse_probe_output(stdout: &[u8]) -> Result<StreamInfo, DecodeError> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| DecodeError::Probe(e.to_string()))?;

    let stream = probe.streams.into_iter().next().ok_or(DecodeError::NoVideoStream)?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::NoVideoStream),
    };

    // Some containers report "N/A" or nothing at all
    let total_frames = stream
        .nb_frames
        .and_then(|n| n.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(StreamInfo {
        width,
        height,
        total_frames,
    })
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, DecodeError> {
        tokio::fs::metadata(path)
            .await
            .map_err(|e| DecodeError::Open(path.to_path_buf(), e))?;

        let info = self.probe(path).await?;

        // Autorotation would swap the probed width and height
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DecodeError::Spawn(self.ffmpeg.clone(), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DecodeError::Exited("ffmpeg stdout unavailable".to_string()))?;

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            total_frames = info.total_frames,
            "Opened video stream"
        );

        Ok(Box::new(FfmpegFrameStream {
            child: Some(child),
            stdout: Some(stdout),
            info,
            position: 0,
            scratch: Vec::new(),
        }))
    }

    async fn health_check(&self) -> Result<(), DecodeError> {
        Self::version_check(&self.ffprobe).await?;
        Self::version_check(&self.ffmpeg).await
    }
}

struct FfmpegFrameStream {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    info: StreamInfo,
    position: u64,
    scratch: Vec<u8>,
}

enum ReadOutcome {
    Frame,
    End,
}

impl FfmpegFrameStream {
    /// Fill `buf` with one raw frame. A clean end of stream is only accepted
    /// on a frame boundary.
    async fn read_raw(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, DecodeError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(ReadOutcome::End);
        };

        let mut filled = 0;
        while filled < buf.len() {
            let n = stdout.read(&mut buf[filled..]).await.map_err(DecodeError::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == buf.len() {
            self.position += 1;
            return Ok(ReadOutcome::Frame);
        }

        let status = self.finish().await?;
        if filled > 0 {
            return Err(DecodeError::Truncated {
                index: self.position,
            });
        }
        match status {
            Some(status) if !status.success() => Err(DecodeError::Exited(status.to_string())),
            _ => Ok(ReadOutcome::End),
        }
    }

    async fn finish(&mut self) -> Result<Option<ExitStatus>, DecodeError> {
        self.stdout = None;
        match self.child.take() {
            Some(mut child) => child.wait().await.map(Some).map_err(DecodeError::Io),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FrameStream for FfmpegFrameStream {
    fn total_frames(&self) -> u64 {
        self.info.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        let index = self.position;
        let mut data = vec![0u8; Frame::byte_len(self.info.width, self.info.height)];
        match self.read_raw(&mut data).await? {
            ReadOutcome::Frame => Ok(Some(Frame {
                index,
                width: self.info.width,
                height: self.info.height,
                data,
            })),
            ReadOutcome::End => Ok(None),
        }
    }

    async fn skip_frame(&mut self) -> Result<bool, DecodeError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(Frame::byte_len(self.info.width, self.info.height), 0);
        let outcome = self.read_raw(&mut scratch).await;
        self.scratch = scratch;
        Ok(matches!(outcome?, ReadOutcome::Frame))
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "ffmpeg already exited");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Cannot open video {0}: {1}")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("Failed to start {0}: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("Video probe failed: {0}")]
    Probe(String),

    #[error("No decodable video stream found")]
    NoVideoStream,

    #[error("Video stream ended mid-frame at frame {index}")]
    Truncated { index: u64 },

    #[error("Decoder exited with {0}")]
    Exited(String),

    #[error("Decoder I/O error: {0}")]
    Io(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_with_frame_count() {
        let out = br#"{"programs": [], "streams": [{"width": 640, "height": 360, "nb_frames": "97"}]}"#;
        let info = parse_probe_output(out).unwrap();

        assert_eq!(
            info,
            StreamInfo {
                width: 640,
                height: 360,
                total_frames: 97
            }
        );
    }

    #[test]
    fn test_parse_probe_unknown_frame_count() {
        let out = br#"{"streams": [{"width": 1280, "height": 720, "nb_frames": "N/A"}]}"#;
        assert_eq!(parse_probe_output(out).unwrap().total_frames, 0);

        let out = br#"{"streams": [{"width": 1280, "height": 720}]}"#;
        assert_eq!(parse_probe_output(out).unwrap().total_frames, 0);
    }

    #[test]
    fn test_parse_probe_without_video() {
        assert!(matches!(
            parse_probe_output(br#"{"streams": []}"#),
            Err(DecodeError::NoVideoStream)
        ));
        assert!(matches!(
            parse_probe_output(br#"{}"#),
            Err(DecodeError::NoVideoStream)
        ));
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(DecodeError::Probe(_))
        ));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let decoder = FfmpegDecoder::new("ffmpeg", "ffprobe");
        let result = decoder.open(Path::new("/nonexistent/clip.mp4")).await;

        assert!(matches!(result, Err(DecodeError::Open(..))));
    }
}
