//! Capture state definitions
//!
//! The recording phase machine, prompt schedule, and session
//! configuration. Configuration is always clamped by the injected
//! capability gate.

use crate::capability::GuestCapabilities;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default prompt-switch threshold, seconds into the recording
pub const DEFAULT_PROMPT_SWITCH_SECONDS: u32 = 15;

/// Default countdown length in one-second ticks
pub const DEFAULT_COUNTDOWN_TICKS: u32 = 3;

/// Secondary prompt shown after the switch threshold
pub const DEFAULT_SECONDARY_PROMPT: &str = "Now share your wish";

/// Errors that can occur during capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no live media stream")]
    StreamNotLive,

    #[error("session already started")]
    AlreadyStarted,

    #[error("session is not recording")]
    NotRecording,

    #[error("session already complete")]
    SessionComplete,

    #[error("nothing recorded yet")]
    NothingRecorded,

    #[error("media stream lost: {0}")]
    StreamLost(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("intro videos are not included in this plan")]
    IntroNotAllowed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Current phase of a capture session
///
/// Phases advance strictly in order; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePhase {
    Idle,
    Countdown,
    Recording,
    Stopped,
}

impl Default for CapturePhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// What kind of clip a session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    /// A guest's response to the event question
    Response,
    /// The organizer's intro video (plan-gated)
    Intro,
}

/// The two-phase prompt shown while recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSchedule {
    /// Primary question, shown from the start
    pub primary: String,

    /// Bonus prompt, shown once the threshold is crossed
    pub secondary: String,

    /// Elapsed-seconds boundary where the prompt switches
    pub switch_at_seconds: u32,
}

impl PromptSchedule {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: DEFAULT_SECONDARY_PROMPT.to_string(),
            switch_at_seconds: DEFAULT_PROMPT_SWITCH_SECONDS,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>, switch_at_seconds: u32) -> Self {
        self.secondary = secondary.into();
        self.switch_at_seconds = switch_at_seconds;
        self
    }

    /// 0 before the switch threshold, 1 at or after it
    pub fn index_at(&self, elapsed_seconds: u32) -> usize {
        usize::from(elapsed_seconds >= self.switch_at_seconds)
    }

    pub fn prompt_at(&self, elapsed_seconds: u32) -> &str {
        if self.index_at(elapsed_seconds) == 0 {
            &self.primary
        } else {
            &self.secondary
        }
    }

    /// Whether the bonus prompt is on screen
    pub fn is_bonus(&self, elapsed_seconds: u32) -> bool {
        self.index_at(elapsed_seconds) == 1
    }
}

/// Configuration for one capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub kind: ClipKind,

    /// Countdown ticks before recording starts
    pub countdown_ticks: u32,

    /// Hard cap, already clamped to the plan ceiling
    pub max_duration_seconds: u32,

    pub prompts: PromptSchedule,
}

impl CaptureConfig {
    /// Configuration for a guest response, capped at the plan ceiling
    pub fn response(capabilities: &GuestCapabilities, prompts: PromptSchedule) -> Self {
        Self {
            kind: ClipKind::Response,
            countdown_ticks: DEFAULT_COUNTDOWN_TICKS,
            max_duration_seconds: capabilities.max_duration_seconds,
            prompts,
        }
    }

    /// Configuration for an organizer intro; refused when the plan
    /// excludes intro videos
    pub fn intro(
        capabilities: &GuestCapabilities,
        prompts: PromptSchedule,
    ) -> CaptureResult<Self> {
        if !capabilities.allow_video_intro {
            return Err(CaptureError::IntroNotAllowed);
        }
        Ok(Self {
            kind: ClipKind::Intro,
            ..Self::response(capabilities, prompts)
        })
    }

    /// Lower the cap below the plan ceiling (never raises it)
    pub fn with_max_duration(mut self, requested_seconds: u32) -> Self {
        self.max_duration_seconds = requested_seconds.clamp(1, self.max_duration_seconds.max(1));
        self
    }
}

/// Events emitted during a capture session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Countdown tick with seconds remaining
    CountdownTick(u32),
    /// Recording started (countdown expired)
    RecordingStarted,
    /// The displayed prompt switched to the bonus question
    PromptSwitched,
    /// Recording stopped with the final duration in seconds
    RecordingStopped { duration_seconds: u32 },
    /// The session was cancelled; no clip was produced
    Cancelled,
    /// Terminal error
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PlanTier;

    #[test]
    fn prompt_switches_at_threshold() {
        let prompts = PromptSchedule::new("What is your favorite memory?");
        assert_eq!(prompts.index_at(0), 0);
        assert_eq!(prompts.index_at(14), 0);
        assert_eq!(prompts.index_at(15), 1);
        assert_eq!(prompts.prompt_at(20), DEFAULT_SECONDARY_PROMPT);
        assert!(prompts.is_bonus(15));
        assert!(!prompts.is_bonus(14));
    }

    #[test]
    fn response_config_uses_plan_ceiling() {
        let caps = GuestCapabilities::from_tier(PlanTier::Free);
        let config = CaptureConfig::response(&caps, PromptSchedule::new("q"));
        assert_eq!(config.max_duration_seconds, 60);
        assert_eq!(config.countdown_ticks, 3);

        let lowered = config.with_max_duration(30);
        assert_eq!(lowered.max_duration_seconds, 30);

        // A request above the ceiling stays clamped
        let caps = GuestCapabilities::from_tier(PlanTier::Pro);
        let config = CaptureConfig::response(&caps, PromptSchedule::new("q")).with_max_duration(999);
        assert_eq!(config.max_duration_seconds, 120);
    }

    #[test]
    fn intro_requires_plan_support() {
        let free = GuestCapabilities::from_tier(PlanTier::Free);
        assert!(matches!(
            CaptureConfig::intro(&free, PromptSchedule::new("q")),
            Err(CaptureError::IntroNotAllowed)
        ));

        let pro = GuestCapabilities::from_tier(PlanTier::Pro);
        let config = CaptureConfig::intro(&pro, PromptSchedule::new("q")).unwrap();
        assert_eq!(config.kind, ClipKind::Intro);
    }
}
