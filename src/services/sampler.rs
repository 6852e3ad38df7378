/// Smallest stride used when sizing the stride from a sample budget.
pub const MIN_STRIDE: u64 = 5;

/// Stride used when the container does not report a frame count.
pub const FALLBACK_STRIDE: u64 = 5;

/// Sample budget used when a caller passes zero.
pub const DEFAULT_TARGET_SAMPLES: u64 = 10;

/// How a pipeline run selects frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPlan {
    /// Spread roughly this many samples across the whole video.
    Budget(u64),
    /// Inspect every n-th frame.
    Fixed(u64),
}

impl SamplingPlan {
    pub fn sampler(self, total_frames: u64) -> FrameSampler {
        match self {
            SamplingPlan::Budget(target) => FrameSampler::for_budget(total_frames, target),
            SamplingPlan::Fixed(stride) => FrameSampler::fixed(stride),
        }
    }
}

/// Selects frame indices by modulo so the decoder only ever reads forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    stride: u64,
}

impl FrameSampler {
    /// `stride = max(MIN_STRIDE, total / target)`, or `FALLBACK_STRIDE` when
    /// the total is unknown (zero).
    pub fn for_budget(total_frames: u64, target_samples: u64) -> Self {
        let target = if target_samples == 0 {
            DEFAULT_TARGET_SAMPLES
        } else {
            target_samples
        };

        let stride = if total_frames == 0 {
            FALLBACK_STRIDE
        } else {
            MIN_STRIDE.max(total_frames / target)
        };

        Self { stride }
    }

    pub fn fixed(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn is_sampled(&self, index: u64) -> bool {
        index % self.stride == 0
    }

    /// Sampled indices within `[0, total_frames)`.
    pub fn indices(&self, total_frames: u64) -> impl Iterator<Item = u64> {
        (0..total_frames).step_by(self.stride as usize)
    }

    /// Percent complete after `processed` sampled frames, held at 99 so that
    /// 100 is only ever reported alongside the completed status.
    pub fn progress_percent(&self, processed: u64, total_frames: u64) -> u8 {
        if total_frames == 0 {
            return 0;
        }
        let covered = processed.saturating_mul(self.stride).saturating_mul(100);
        (covered / total_frames).min(99) as u8
    }
}
