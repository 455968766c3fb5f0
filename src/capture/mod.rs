//! Guest recording pipeline
//!
//! Countdown → bounded recording with a phase-based prompt switch → one
//! sealed clip blob. A session is single-use: a retake builds a new one.

pub mod encoder;
pub mod session;
pub mod state;

pub use encoder::{ClipEncoder, FfmpegClipEncoder, MediaChunk};
pub use session::{CaptureSession, CompletedClip, Tick};
pub use state::{
    CaptureConfig, CaptureError, CaptureEvent, CapturePhase, CaptureResult, ClipKind,
    PromptSchedule,
};
