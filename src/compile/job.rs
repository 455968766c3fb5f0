//! Compilation job types
//!
//! Job states, progress reporting, and the error taxonomy for the
//! compilation pipeline.

use crate::compose::compositor::CompositeError;
use crate::decode::DecodeError;
use crate::mux::MuxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compilation errors
#[derive(Error, Debug)]
pub enum CompileError {
    /// The clip queue was empty; nothing was allocated
    #[error("No clips to compile")]
    EmptyQueue,

    /// A compilation is already running
    #[error("A compilation is already in progress")]
    AlreadyCompiling,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Mux(#[from] MuxError),
}

impl From<CompositeError> for CompileError {
    fn from(e: CompositeError) -> Self {
        match e {
            CompositeError::Decode(e) => CompileError::Decode(e),
            CompositeError::Mux(e) => CompileError::Mux(e),
        }
    }
}

/// Job state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CompileState {
    NotStarted,
    /// Compositing the clip at this queue index
    #[serde(rename_all = "camelCase")]
    Compiling { current_index: usize },
    /// All clips composited; flushing the muxer
    Finalizing,
    Done,
    Failed { message: String },
}

/// Progress snapshot for UI polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileProgress {
    /// Monotonically non-decreasing; exactly 1.0 only at Done
    pub fraction: f64,
    pub state: CompileState,
    pub clips_done: usize,
    pub clip_total: usize,
}

/// Enforces the progress contract: never decreasing, 1.0 reserved for Done
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next snapshot, clamping the fraction into the contract
    pub fn snapshot(
        &mut self,
        state: CompileState,
        raw_fraction: f64,
        clips_done: usize,
        clip_total: usize,
    ) -> CompileProgress {
        let ceiling = if state == CompileState::Done { 1.0 } else { 0.99 };
        let fraction = raw_fraction.clamp(self.last, ceiling);
        self.last = fraction;
        CompileProgress {
            fraction,
            state,
            clips_done,
            clip_total,
        }
    }
}

/// Events broadcast while a job runs
#[derive(Debug, Clone)]
pub enum CompileEvent {
    Progress(CompileProgress),
    /// The job finished; the output is ready for pickup
    Complete {
        clip_count: usize,
        duration_seconds: f64,
    },
    Failed(String),
}
