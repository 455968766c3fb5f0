//! Native camera+microphone device backend

use crate::acquire::camera::start_camera_worker;
use crate::acquire::microphone::start_microphone_worker;
use crate::acquire::traits::{AcquireError, MediaConstraints, MediaDevice, MediaStream};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Acquires the device camera and microphone through nokhwa and cpal
///
/// `None` device ids select the platform defaults.
#[derive(Debug, Clone, Default)]
pub struct CameraMicDevice {
    pub camera_id: Option<String>,
    pub microphone_id: Option<String>,
}

impl CameraMicDevice {
    pub fn new(camera_id: Option<String>, microphone_id: Option<String>) -> Self {
        Self {
            camera_id,
            microphone_id,
        }
    }
}

#[async_trait]
impl MediaDevice for CameraMicDevice {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStream, AcquireError> {
        if !constraints.video && !constraints.audio {
            return Err(AcquireError::DeviceUnavailable(
                "at least one of video or audio must be requested".to_string(),
            ));
        }

        let live = Arc::new(AtomicBool::new(true));
        let mut handles = Vec::new();

        let video = if constraints.video {
            match start_camera_worker(self.camera_id.clone(), live.clone()) {
                Ok((track, handle)) => {
                    handles.push(handle);
                    Some(track)
                }
                Err(e) => {
                    // Don't leave a half-acquired stream behind
                    live.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let audio = if constraints.audio {
            match start_microphone_worker(self.microphone_id.clone(), live.clone()) {
                Ok((track, handle)) => {
                    handles.push(handle);
                    Some(track)
                }
                Err(e) => {
                    live.store(false, Ordering::SeqCst);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::info!(
            "Acquired media stream (video: {}, audio: {})",
            video.is_some(),
            audio.is_some()
        );

        let teardown_live = live.clone();
        Ok(MediaStream::new(video, audio, live, move || {
            teardown_live.store(false, Ordering::SeqCst);
            for handle in handles {
                let _ = handle.join();
            }
        }))
    }
}
