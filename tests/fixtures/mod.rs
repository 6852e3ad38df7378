//! Scripted videos understood by the fake decoder in `helpers`.

/// A fake video: the uploaded bytes name the fixture, the fake decoder
/// replays its frames.
#[derive(Debug, Clone)]
pub struct VideoFixture {
    pub name: &'static str,
    /// Frames actually produced by the decoder.
    pub frames: u64,
    /// Frame count the container claims (0 = unknown).
    pub reported_frames: u64,
    /// (frame index, apples visible) for frames containing apples.
    pub apples: &'static [(u64, u8)],
    /// (frame index, other objects visible).
    pub others: &'static [(u64, u8)],
    /// Expected result with the default budget of 10 samples.
    pub expected_count: u64,
    pub expected_frames_processed: u64,
    pub expected_total_frames: u64,
    /// Expected count when every 5th frame is inspected.
    pub expected_fixed_stride_count: u64,
    pub description: &'static str,
}

impl VideoFixture {
    pub fn upload_bytes(&self) -> Vec<u8> {
        format!("FAKEVIDEO:{}", self.name).into_bytes()
    }

    pub fn apples_at(&self, index: u64) -> u8 {
        lookup(self.apples, index)
    }

    pub fn others_at(&self, index: u64) -> u8 {
        lookup(self.others, index)
    }
}

fn lookup(table: &[(u64, u8)], index: u64) -> u8 {
    table
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}

pub const SHORT_CLIP: VideoFixture = VideoFixture {
    name: "short_clip",
    frames: 97,
    reported_frames: 97,
    apples: &[(0, 2), (18, 1), (45, 3), (50, 5)],
    others: &[(9, 4), (45, 1)],
    expected_count: 6,
    expected_frames_processed: 11,
    expected_total_frames: 97,
    expected_fixed_stride_count: 10,
    description: "97 frames, stride 9; frame 50 is only seen with stride 5",
};

pub const UNKNOWN_LENGTH: VideoFixture = VideoFixture {
    name: "unknown_length",
    frames: 23,
    reported_frames: 0,
    apples: &[(5, 1), (7, 9), (20, 2)],
    others: &[],
    expected_count: 3,
    expected_frames_processed: 5,
    expected_total_frames: 23,
    expected_fixed_stride_count: 3,
    description: "Container reports no frame count; fallback stride 5",
};

pub const EMPTY_ORCHARD: VideoFixture = VideoFixture {
    name: "empty_orchard",
    frames: 40,
    reported_frames: 40,
    apples: &[],
    others: &[(0, 3), (10, 2)],
    expected_count: 0,
    expected_frames_processed: 8,
    expected_total_frames: 40,
    expected_fixed_stride_count: 0,
    description: "No apples anywhere, other objects present",
};

pub const UNDER_REPORTED: VideoFixture = VideoFixture {
    name: "under_reported",
    frames: 30,
    reported_frames: 10,
    apples: &[(25, 1)],
    others: &[],
    expected_count: 1,
    expected_frames_processed: 6,
    expected_total_frames: 30,
    expected_fixed_stride_count: 1,
    description: "Container claims 10 frames but decodes 30",
};

pub const FIXTURES: &[VideoFixture] = &[SHORT_CLIP, UNKNOWN_LENGTH, EMPTY_ORCHARD, UNDER_REPORTED];

pub fn by_name(name: &str) -> Option<&'static VideoFixture> {
    FIXTURES.iter().find(|f| f.name == name)
}
