//! Acquisition trait definitions
//!
//! Platform-agnostic types for device streams. A [`MediaStream`] owns the
//! live device workers; releasing it stops them and turns the hardware
//! indicator off. Release is idempotent and also happens on drop, so no
//! exit path can leave a device running.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by device acquisition
///
/// Both variants are terminal and user-visible; there is no silent
/// fallback to a lower-capability stream.
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Which tracks to request from the device layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn video_and_audio() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// One raw camera frame in the track's native pixel format
#[derive(Debug)]
pub struct VideoFrame {
    pub data: Vec<u8>,

    /// Milliseconds since the track started
    pub timestamp_ms: f64,
}

/// Live camera frames plus the metadata an encoder needs
pub struct VideoTrack {
    pub frames: Receiver<VideoFrame>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,

    /// FFmpeg pixel format name for the raw frames (e.g. "yuyv422")
    pub pixel_format: String,
}

/// Live microphone samples, interleaved stereo i16
pub struct AudioTrack {
    pub samples: Receiver<Vec<i16>>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A scoped handle to live capture hardware
///
/// At most one active stream owns the device at a time; acquiring a new
/// one without releasing the prior is the bug class the explicit teardown
/// guards against.
pub struct MediaStream {
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    has_video: bool,
    has_audio: bool,
    live: Arc<AtomicBool>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl MediaStream {
    /// Assemble a stream from live tracks and a teardown routine
    ///
    /// `live` is shared with the device workers; teardown must flip it and
    /// join them.
    pub fn new(
        video: Option<VideoTrack>,
        audio: Option<AudioTrack>,
        live: Arc<AtomicBool>,
        teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            has_video: video.is_some(),
            has_audio: audio.is_some(),
            video,
            audio,
            live,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn has_video(&self) -> bool {
        self.has_video
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Hand the video track to an encoder; at most one taker
    pub fn take_video_track(&mut self) -> Option<VideoTrack> {
        self.video.take()
    }

    /// Hand the audio track to an encoder; at most one taker
    pub fn take_audio_track(&mut self) -> Option<AudioTrack> {
        self.audio.take()
    }

    /// Stop every device worker; idempotent
    pub fn release(&mut self) {
        self.video = None;
        self.audio = None;
        if let Some(teardown) = self.teardown.take() {
            tracing::info!("Releasing media stream");
            self.live.store(false, Ordering::SeqCst);
            teardown();
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Trait for device backends that can produce a [`MediaStream`]
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Turn on the requested hardware and return a live stream
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStream, AcquireError>;
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// Information about an audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

/// Classify a backend failure message into the acquisition taxonomy
///
/// Backends report permission problems with wildly different wording;
/// anything that mentions permission or access denial maps to
/// `PermissionDenied`, everything else to `DeviceUnavailable`.
pub(crate) fn classify_device_error(device: &str, detail: impl AsRef<str>) -> AcquireError {
    let detail = detail.as_ref();
    let lower = detail.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        AcquireError::PermissionDenied(format!("{device}: {detail}"))
    } else {
        AcquireError::DeviceUnavailable(format!("{device}: {detail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn classify_permission_messages() {
        assert!(matches!(
            classify_device_error("camera", "Permission denied by user"),
            AcquireError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_device_error("camera", "device is not authorized"),
            AcquireError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_device_error("camera", "no such device"),
            AcquireError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn release_is_idempotent_and_runs_once() {
        let (_, frames) = mpsc::channel();
        let track = VideoTrack {
            frames,
            width: 640,
            height: 480,
            frame_rate: 30,
            pixel_format: "yuyv422".to_string(),
        };

        let live = Arc::new(AtomicBool::new(true));
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = torn_down.clone();
        let mut stream = MediaStream::new(Some(track), None, live.clone(), move || {
            assert!(!flag.swap(true, Ordering::SeqCst), "teardown ran twice");
        });

        assert!(stream.is_live());
        assert!(stream.has_video());
        assert!(!stream.has_audio());

        stream.release();
        stream.release();
        assert!(!stream.is_live());
        assert!(torn_down.load(Ordering::SeqCst));
    }

    #[test]
    fn drop_releases_stream() {
        let live = Arc::new(AtomicBool::new(true));
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = torn_down.clone();
        {
            let _stream = MediaStream::new(None, None, live.clone(), move || {
                flag.store(true, Ordering::SeqCst);
            });
        }
        assert!(!live.load(Ordering::SeqCst));
        assert!(torn_down.load(Ordering::SeqCst));
    }
}
