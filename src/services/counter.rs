use crate::models::detection::Detection;
use crate::models::job::CountResult;

/// Class name counted by both endpoints.
pub const TARGET_LABEL: &str = "apple";

/// Running tally of target-label detections over sampled frames.
#[derive(Debug, Clone)]
pub struct DetectionCounter {
    label: String,
    count: u64,
    frames_processed: u64,
}

impl DetectionCounter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
            frames_processed: 0,
        }
    }

    /// Add one sampled frame's detections. Returns the matches in that frame.
    ///
    /// Labels are compared exactly, so "Apple" does not count as "apple".
    pub fn accumulate(&mut self, detections: &[Detection]) -> u64 {
        let matches = detections
            .iter()
            .filter(|d| d.label == self.label)
            .count() as u64;

        self.count += matches;
        self.frames_processed += 1;
        matches
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn finish(self, total_frames: u64) -> CountResult {
        CountResult {
            apple_count: self.count,
            frames_processed: self.frames_processed,
            total_frames: total_frames.max(self.frames_processed),
        }
    }
}

impl Default for DetectionCounter {
    fn default() -> Self {
        Self::new(TARGET_LABEL)
    }
}
