//! Camera capture using nokhwa
//!
//! Opens the camera on a dedicated worker thread and pushes raw frames in
//! the camera's native pixel format. No CPU-side conversion happens here;
//! the format name travels with the track so the encoder can hand the raw
//! bytes straight to FFmpeg.

use crate::acquire::traits::{classify_device_error, AcquireError, CameraInfo, VideoFrame, VideoTrack};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long to wait for the worker to report the camera opened
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => {
            if let Ok(idx) = id.parse::<u32>() {
                CameraIndex::Index(idx)
            } else {
                CameraIndex::String(id.to_string())
            }
        }
        None => CameraIndex::Index(0),
    }
}

/// Map nokhwa's frame format to the FFmpeg pixel format string
fn ffmpeg_pix_fmt(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::YUYV => "yuyv422",
        FrameFormat::NV12 => "nv12",
        FrameFormat::RAWRGB => "rgb24",
        FrameFormat::MJPEG => "mjpeg",
        _ => {
            tracing::warn!("Unknown camera format {:?}, assuming yuyv422", format);
            "yuyv422"
        }
    }
}

struct CameraMeta {
    width: u32,
    height: u32,
    frame_rate: u32,
    pixel_format: String,
}

/// Open the camera and start streaming frames until `live` flips false
///
/// The camera object lives entirely on the worker thread; open failures
/// are reported back through a ready handshake so the caller sees a
/// classified [`AcquireError`] instead of a dead track.
pub(crate) fn start_camera_worker(
    device_id: Option<String>,
    live: Arc<AtomicBool>,
) -> Result<(VideoTrack, JoinHandle<()>), AcquireError> {
    let index = camera_index(device_id.as_deref());
    let (ready_tx, ready_rx) = mpsc::channel::<Result<CameraMeta, AcquireError>>();
    let (frame_tx, frame_rx) = mpsc::channel::<VideoFrame>();

    let handle = std::thread::spawn(move || {
        let format =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = match Camera::new(index.clone(), format) {
            Ok(c) => c,
            Err(e) => {
                let _ = ready_tx.send(Err(classify_device_error("camera", format!("{e:?}"))));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = ready_tx.send(Err(classify_device_error("camera", format!("{e:?}"))));
            return;
        }

        let camera_format = camera.camera_format();
        let meta = CameraMeta {
            width: camera_format.resolution().width(),
            height: camera_format.resolution().height(),
            frame_rate: camera_format.frame_rate(),
            pixel_format: ffmpeg_pix_fmt(camera_format.format()).to_string(),
        };
        tracing::info!(
            "Camera {:?} opened: {}x{} @ {}fps, pix_fmt={}",
            index,
            meta.width,
            meta.height,
            meta.frame_rate,
            meta.pixel_format
        );
        if ready_tx.send(Ok(meta)).is_err() {
            let _ = camera.stop_stream();
            return;
        }

        let started = Instant::now();
        let mut frame_count: u64 = 0;
        while live.load(Ordering::SeqCst) {
            // Blocks until the camera delivers the next frame; the camera
            // controls the timing.
            match camera.frame() {
                Ok(frame) => {
                    let sent = frame_tx.send(VideoFrame {
                        data: frame.buffer().to_vec(),
                        timestamp_ms: started.elapsed().as_secs_f64() * 1000.0,
                    });
                    if sent.is_err() {
                        break;
                    }
                    frame_count += 1;
                }
                Err(e) => {
                    tracing::debug!("Failed to capture camera frame: {:?}", e);
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Error stopping camera stream: {:?}", e);
        }
        tracing::info!(
            "Camera worker stopped after {} frames in {:.2}s",
            frame_count,
            started.elapsed().as_secs_f64()
        );
    });

    let meta = ready_rx
        .recv_timeout(OPEN_TIMEOUT)
        .map_err(|_| AcquireError::DeviceUnavailable("camera worker did not start".to_string()))??;

    Ok((
        VideoTrack {
            frames: frame_rx,
            width: meta.width,
            height: meta.height,
            frame_rate: meta.frame_rate.max(1),
            pixel_format: meta.pixel_format,
        },
        handle,
    ))
}
