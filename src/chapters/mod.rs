/// Chapter extraction and segment planning
///
/// Chapters are read from `MM:SS Title` lines in a video description and turned
/// into the time ranges that get cut into separate clips.

pub mod parser;
pub mod planner;

// Re-export main types
pub use parser::{parse_timestamps, to_seconds};
pub use planner::{build_segments, CLIP_EXTENSION, END_MARKER};

use serde::{Deserialize, Serialize};

/// A single chapter line found in a description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimestampEntry {
    /// Chapter start as written in the description (`MM:SS`)
    pub time: String,
    /// Chapter title, trimmed
    pub label: String,
}

impl TimestampEntry {
    pub fn new(time: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            label: label.into(),
        }
    }
}

/// A time range to extract as one clip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// Start offset in seconds
    pub start_seconds: u32,
    /// End offset in seconds, `None` runs to the end of the media
    pub end_seconds: Option<u32>,
    /// Chapter title
    pub label: String,
    /// Clip filename inside the output directory
    pub output_filename: String,
}

impl Segment {
    /// Length in seconds, if the segment is bounded
    pub fn duration_seconds(&self) -> Option<u32> {
        self.end_seconds.map(|end| end.saturating_sub(self.start_seconds))
    }
}
