use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::state::RunState;

/// Result type for chapter splitting operations
pub type Result<T> = std::result::Result<T, SplitError>;

/// Error types for a chapter splitting run
#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    #[error("no cookie file was supplied")]
    MissingCredential,

    #[error("cookie file not found: {}", .0.display())]
    CredentialNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("download failed: {0}")]
    Acquisition(String),

    #[error("no chapters found in the video description")]
    NoChapters,

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("trimming {clip} failed: {message}")]
    Transcoding { clip: String, message: String },

    #[error("{tool} is not available: {message}")]
    ToolUnavailable { tool: String, message: String },

    #[error("a run is already in progress")]
    RunInProgress,

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a failed run, recorded in run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    MissingCredential,
    Acquisition,
    NoChapters,
    Transcoding,
    Cancelled,
    Other,
}

impl SplitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SplitError::MissingCredential | SplitError::CredentialNotFound(_) => {
                FailureKind::MissingCredential
            }
            SplitError::Acquisition(_) => FailureKind::Acquisition,
            SplitError::NoChapters => FailureKind::NoChapters,
            SplitError::Transcoding { .. } => FailureKind::Transcoding,
            SplitError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }

    /// Message shown to the user when a run ends with this error
    pub fn user_message(&self) -> String {
        match self {
            SplitError::MissingCredential => "Please select a cookies file.".to_string(),
            SplitError::NoChapters => "No table of contents was found. Make sure the video \
                 description contains chapter timestamps."
                .to_string(),
            other => format!("An error occurred: {}", other),
        }
    }
}
