use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SplitError};

/// Stages of a single download-and-trim run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Nothing started yet
    Idle,

    /// Downloading the video and its metadata
    Acquiring,

    /// Reading chapters from the description
    Parsing,

    /// Cutting clips at chapter boundaries
    Trimming,

    /// Every clip was written
    Done,

    /// The run stopped on an error
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// The state a successful stage leads to
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Acquiring),
            RunState::Acquiring => Some(RunState::Parsing),
            RunState::Parsing => Some(RunState::Trimming),
            RunState::Trimming => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RunState::Failed || self.next() == Some(to)
    }
}

/// One recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: RunState,
    pub at: DateTime<Utc>,
}

/// Tracks the current run state and every state entered so far
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    current: RunState,
    history: Vec<StateTransition>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
            history: vec![StateTransition {
                state: RunState::Idle,
                at: Utc::now(),
            }],
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Move to `to`, rejecting anything the run graph does not allow
    pub fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.current.can_transition_to(to) {
            return Err(SplitError::InvalidTransition {
                from: self.current,
                to,
            });
        }

        debug!("🔄 Run state {:?} -> {:?}", self.current, to);
        self.current = to;
        self.history.push(StateTransition {
            state: to,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Enter `Failed` unless the run already ended.
    ///
    /// Returns false when the machine was already terminal.
    pub fn fail(&mut self) -> bool {
        self.transition(RunState::Failed).is_ok()
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
