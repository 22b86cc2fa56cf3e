//! Chapter Splitter
//!
//! Downloads a video, reads the `MM:SS Title` table of contents from its
//! description and cuts one clip per chapter with ffmpeg.

pub mod sanitize;
pub mod chapters;
pub mod config;
pub mod error;
pub mod state;
pub mod process;
pub mod download;
pub mod transcode;
pub mod processing;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{FailureKind, Result, SplitError};
pub use crate::sanitize::sanitize_filename;
pub use crate::chapters::{build_segments, parse_timestamps, to_seconds, Segment, TimestampEntry};
pub use crate::state::{RunState, RunStateMachine};
pub use crate::download::{Acquisition, AcquireRequest, Downloader, ProgressFn, YtDlpDownloader};
pub use crate::transcode::{ClipJob, FfmpegTranscoder, Transcoder};
pub use crate::processing::{ChapterSplitter, RunCanceller, RunEvent, RunHandle, RunReport, RunRequest};
