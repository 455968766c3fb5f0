//! User-facing error mapping
//!
//! Every terminal error a guest or organizer can hit maps to a stable
//! code, a human-readable message, and a recovery action the UI can
//! offer. Raw technical errors never reach the guest directly.

use crate::acquire::traits::AcquireError;
use crate::capture::state::CaptureError;
use crate::compile::job::CompileError;
use crate::decode::DecodeError;
use crate::mux::MuxError;
use crate::review::SubmitError;
use serde::{Deserialize, Serialize};

/// What the UI should offer after a terminal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    /// Re-request device permission and try again
    RetryPermission,
    /// Pick another device or check the hardware, then retry
    RetryDevice,
    /// Record again from the start
    Retake,
    /// Resubmit the same clip
    Resubmit,
    /// Start the export over
    RestartCompilation,
}

/// Error response for the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub recovery: RecoveryAction,
}

impl ErrorResponse {
    fn new(code: &str, message: impl Into<String>, recovery: RecoveryAction) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            recovery,
        }
    }
}

impl From<&AcquireError> for ErrorResponse {
    fn from(error: &AcquireError) -> Self {
        match error {
            AcquireError::PermissionDenied(_) => Self::new(
                "PERMISSION_DENIED",
                "Camera access denied. Please allow camera and microphone access, then try again.",
                RecoveryAction::RetryPermission,
            ),
            AcquireError::DeviceUnavailable(_) => Self::new(
                "DEVICE_UNAVAILABLE",
                "We couldn't find a usable camera or microphone. Check your device and try again.",
                RecoveryAction::RetryDevice,
            ),
        }
    }
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        match error {
            CaptureError::StreamLost(_) => Self::new(
                "DEVICE_UNAVAILABLE",
                "The camera stopped responding, so this take was discarded. Please record again.",
                RecoveryAction::Retake,
            ),
            CaptureError::IntroNotAllowed => Self::new(
                "INTRO_NOT_ALLOWED",
                "Video intros aren't included in this plan.",
                RecoveryAction::Retake,
            ),
            CaptureError::Encoder(_) => Self::new(
                "ENCODER_UNSUPPORTED",
                "Recording isn't supported on this device right now. Please try again.",
                RecoveryAction::Retake,
            ),
            _ => Self::new(
                "RECORDING_ERROR",
                "Something went wrong while recording. Please record again.",
                RecoveryAction::Retake,
            ),
        }
    }
}

impl From<&SubmitError> for ErrorResponse {
    fn from(error: &SubmitError) -> Self {
        match error {
            SubmitError::UploadFailure(_) => Self::new(
                "UPLOAD_FAILURE",
                "Something went wrong while uploading. Don't worry, your video is safe. Try again.",
                RecoveryAction::Resubmit,
            ),
            _ => Self::new(
                "UPLOAD_FAILURE",
                "This video can't be submitted. Please record a new one.",
                RecoveryAction::Retake,
            ),
        }
    }
}

impl From<&CompileError> for ErrorResponse {
    fn from(error: &CompileError) -> Self {
        match error {
            CompileError::EmptyQueue => Self::new(
                "EMPTY_QUEUE",
                "No collected videos to merge yet. Wait for guests to submit.",
                RecoveryAction::RestartCompilation,
            ),
            CompileError::AlreadyCompiling => Self::new(
                "ALREADY_COMPILING",
                "A compilation is already running. Wait for it to finish.",
                RecoveryAction::RestartCompilation,
            ),
            CompileError::Decode(e) => e.into(),
            CompileError::Mux(e) => e.into(),
        }
    }
}

impl From<&DecodeError> for ErrorResponse {
    fn from(_: &DecodeError) -> Self {
        Self::new(
            "DECODE_FAILURE",
            "One of the collected videos couldn't be read, so the movie wasn't created. \
             Please restart the export.",
            RecoveryAction::RestartCompilation,
        )
    }
}

impl From<&MuxError> for ErrorResponse {
    fn from(error: &MuxError) -> Self {
        match error {
            MuxError::EncoderUnsupported(_) => Self::new(
                "ENCODER_UNSUPPORTED",
                "This device can't create the movie in the requested format.",
                RecoveryAction::RestartCompilation,
            ),
            _ => Self::new(
                "COMPILE_ERROR",
                "Something went wrong while creating the movie. Please restart the export.",
                RecoveryAction::RestartCompilation,
            ),
        }
    }
}
