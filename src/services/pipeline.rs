use std::path::Path;
use std::sync::Arc;

use crate::models::job::CountResult;
use crate::services::counter::DetectionCounter;
use crate::services::decoder::{DecodeError, FrameStream, VideoDecoder};
use crate::services::detector::{DetectError, Detector};
use crate::services::sampler::SamplingPlan;

/// Receives progress after every sampled frame.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, percent: u8, frames_processed: u64);
}

/// Sink for callers that only want the final count.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _percent: u8, _frames_processed: u64) {}
}

/// Decode -> sample -> detect -> count, shared by the blocking endpoint and
/// the job runner.
#[derive(Clone)]
pub struct Pipeline {
    decoder: Arc<dyn VideoDecoder>,
    detector: Arc<dyn Detector>,
    label: String,
}

impl Pipeline {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        detector: Arc<dyn Detector>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            detector,
            label: label.into(),
        }
    }

    pub fn decoder(&self) -> &Arc<dyn VideoDecoder> {
        &self.decoder
    }

    /// Count the target label in the video at `path`.
    ///
    /// The decoder is closed before returning, whether counting succeeded
    /// or not.
    pub async fn count(
        &self,
        path: &Path,
        plan: SamplingPlan,
        progress: &dyn ProgressSink,
    ) -> Result<CountResult, PipelineError> {
        let mut stream = self.decoder.open(path).await?;
        let result = self.drive(stream.as_mut(), plan, progress).await;
        stream.close().await;
        result
    }

    async fn drive(
        &self,
        stream: &mut dyn FrameStream,
        plan: SamplingPlan,
        progress: &dyn ProgressSink,
    ) -> Result<CountResult, PipelineError> {
        let total = stream.total_frames();
        let sampler = plan.sampler(total);
        let mut counter = DetectionCounter::new(self.label.as_str());

        tracing::debug!(total_frames = total, stride = sampler.stride(), "Sampling video");

        loop {
            if !sampler.is_sampled(stream.position()) {
                if stream.skip_frame().await? {
                    continue;
                }
                break;
            }

            let Some(frame) = stream.next_frame().await? else {
                break;
            };

            let detections = self
                .detector
                .detect(&frame)
                .await
                .map_err(|source| PipelineError::Inference {
                    index: frame.index,
                    source,
                })?;
            let matches = counter.accumulate(&detections);
            metrics::counter!("frames_inferred_total").increment(1);

            tracing::trace!(
                frame = frame.index,
                detections = detections.len(),
                matches,
                "Frame inferred"
            );

            progress.on_progress(
                sampler.progress_percent(counter.frames_processed(), total),
                counter.frames_processed(),
            );
        }

        let decoded = stream.position();
        Ok(counter.finish(total.max(decoded)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Video decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Inference failed on frame {index}: {source}")]
    Inference {
        index: u64,
        #[source]
        source: DetectError,
    },
}
