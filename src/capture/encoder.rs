//! Clip encoders
//!
//! [`ClipEncoder`] is the seam between the capture session and the
//! platform encoder. The native implementation pipes raw camera frames
//! into an FFmpeg child producing a streamable fragmented spool, spools
//! microphone PCM alongside, and remuxes both into the sealed clip file
//! on finish.

use crate::acquire::traits::MediaStream;
use crate::capture::state::{CaptureError, CaptureResult};
use crate::clip::ClipBlob;
use parking_lot::Mutex as ParkingMutex;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;

/// One encoded media fragment appended to the session's chunk log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaChunk {
    /// Append order, starting at 0
    pub seq: u64,

    /// Fragment size in bytes
    pub len: usize,
}

/// Trait for encoders that turn a live [`MediaStream`] into one clip blob
pub trait ClipEncoder: Send {
    /// Attach to the stream's tracks and start encoding
    fn start(&mut self, stream: &mut MediaStream) -> CaptureResult<()>;

    /// Drain fragments encoded since the last poll
    fn poll(&mut self) -> CaptureResult<Vec<MediaChunk>>;

    /// Flush and seal everything encoded so far into one playable blob
    fn finish(&mut self) -> CaptureResult<ClipBlob>;

    /// Discard all partial output; nothing is handed downstream
    fn abort(&mut self);
}

struct EncoderWorkers {
    stop: Arc<AtomicBool>,
    process: Arc<ParkingMutex<Option<Child>>>,
    video_thread: Option<JoinHandle<()>>,
    audio_thread: Option<JoinHandle<()>>,
    audio_sample_rate: u32,
}

/// FFmpeg-backed clip encoder
pub struct FfmpegClipEncoder {
    workdir: TempDir,
    spool_path: PathBuf,
    audio_path: PathBuf,
    clip_path: PathBuf,
    workers: Option<EncoderWorkers>,
    spool_read: u64,
    next_seq: u64,
    aborted: bool,
}

impl FfmpegClipEncoder {
    pub fn new() -> CaptureResult<Self> {
        let workdir = TempDir::new()?;
        let spool_path = workdir.path().join("capture-spool.mp4");
        let audio_path = workdir.path().join("capture-audio.pcm");
        let clip_path = workdir.path().join("clip.mp4");
        Ok(Self {
            workdir,
            spool_path,
            audio_path,
            clip_path,
            workers: None,
            spool_read: 0,
            next_seq: 0,
            aborted: false,
        })
    }

    fn shutdown_workers(&mut self) -> Option<EncoderWorkers> {
        let mut workers = self.workers.take()?;
        workers.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = workers.video_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = workers.audio_thread.take() {
            let _ = handle.join();
        }
        Some(workers)
    }

    fn wait_for_process(workers: &EncoderWorkers) -> CaptureResult<()> {
        let child = workers.process.lock().take();
        if let Some(mut child) = child {
            // Close stdin to signal EOF, then let FFmpeg flush the spool
            drop(child.stdin.take());
            let output = child
                .wait_with_output()
                .map_err(|e| CaptureError::Encoder(format!("failed to wait for FFmpeg: {e}")))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!("FFmpeg capture encoder exited with {}: {}", output.status, stderr);
            }
        }
        Ok(())
    }

    /// Remux the video spool and PCM side file into the sealed clip
    fn remux(&self, audio_sample_rate: u32) -> CaptureResult<()> {
        let audio_bytes = std::fs::metadata(&self.audio_path).map(|m| m.len()).unwrap_or(0);

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-i"]).arg(&self.spool_path);
        if audio_bytes > 0 {
            cmd.args([
                "-f",
                "s16le",
                "-ar",
                &audio_sample_rate.to_string(),
                "-ac",
                "2",
                "-i",
            ])
            .arg(&self.audio_path)
            .args(["-c:v", "copy", "-c:a", "aac", "-b:a", "192k", "-shortest"]);
        } else {
            cmd.args(["-c", "copy"]);
        }
        cmd.args(["-movflags", "+faststart"]).arg(&self.clip_path);

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CaptureError::Encoder(format!("failed to run FFmpeg mux: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Encoder(format!(
                "clip mux failed: {stderr}"
            )));
        }
        Ok(())
    }
}

impl ClipEncoder for FfmpegClipEncoder {
    fn start(&mut self, stream: &mut MediaStream) -> CaptureResult<()> {
        if self.workers.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let video = stream
            .take_video_track()
            .ok_or_else(|| CaptureError::Encoder("no video track on stream".to_string()))?;
        let audio = stream.take_audio_track();
        let audio_sample_rate = audio.as_ref().map(|a| a.sample_rate).unwrap_or(48_000);

        // Fragmented output so the spool stays playable while it grows and
        // fragments can be polled off the tail.
        let child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pixel_format",
                &video.pixel_format,
                "-video_size",
                &format!("{}x{}", video.width, video.height),
                "-framerate",
                &video.frame_rate.to_string(),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                "-crf",
                "23",
                "-g",
                &(video.frame_rate * 2).to_string(),
                "-movflags",
                "+frag_keyframe+empty_moov",
                "-f",
                "mp4",
            ])
            .arg(&self.spool_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::Encoder(format!("failed to start FFmpeg encoder: {e}")))?;

        tracing::info!(
            "Started clip encoder: {}x{} @ {}fps, pix_fmt={}, audio={}",
            video.width,
            video.height,
            video.frame_rate,
            video.pixel_format,
            audio.is_some()
        );

        let stop = Arc::new(AtomicBool::new(false));
        let process = Arc::new(ParkingMutex::new(Some(child)));

        let video_stop = stop.clone();
        let video_process = process.clone();
        let video_thread = std::thread::spawn(move || {
            let frames = video.frames;
            while !video_stop.load(Ordering::SeqCst) {
                match frames.recv_timeout(Duration::from_millis(100)) {
                    Ok(frame) => {
                        let mut guard = video_process.lock();
                        let Some(child) = guard.as_mut() else { break };
                        let Some(stdin) = child.stdin.as_mut() else { break };
                        if stdin.write_all(&frame.data).is_err() {
                            tracing::warn!("Clip encoder stdin closed; stopping frame feed");
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        let audio_thread = audio.map(|track| {
            let audio_stop = stop.clone();
            let audio_path = self.audio_path.clone();
            std::thread::spawn(move || {
                let Ok(mut file) = std::fs::File::create(&audio_path) else {
                    tracing::error!("Failed to create audio spool {:?}", audio_path);
                    return;
                };
                let samples = track.samples;
                while !audio_stop.load(Ordering::SeqCst) {
                    match samples.recv_timeout(Duration::from_millis(100)) {
                        Ok(buf) => {
                            let mut bytes = Vec::with_capacity(buf.len() * 2);
                            for s in buf {
                                bytes.extend_from_slice(&s.to_le_bytes());
                            }
                            if file.write_all(&bytes).is_err() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = file.flush();
            })
        });

        self.workers = Some(EncoderWorkers {
            stop,
            process,
            video_thread: Some(video_thread),
            audio_thread,
            audio_sample_rate,
        });
        Ok(())
    }

    fn poll(&mut self) -> CaptureResult<Vec<MediaChunk>> {
        if self.workers.is_none() {
            return Err(CaptureError::NotRecording);
        }

        // New bytes on the spool tail are the fragments FFmpeg flushed
        // since the last poll.
        let Ok(mut file) = std::fs::File::open(&self.spool_path) else {
            return Ok(Vec::new());
        };
        let len = file.metadata()?.len();
        if len <= self.spool_read {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.spool_read))?;
        let mut fragment = Vec::with_capacity((len - self.spool_read) as usize);
        file.read_to_end(&mut fragment)?;
        self.spool_read = len;

        let chunk = MediaChunk {
            seq: self.next_seq,
            len: fragment.len(),
        };
        self.next_seq += 1;
        Ok(vec![chunk])
    }

    fn finish(&mut self) -> CaptureResult<ClipBlob> {
        if self.aborted {
            return Err(CaptureError::SessionComplete);
        }
        let workers = self
            .shutdown_workers()
            .ok_or(CaptureError::NotRecording)?;
        Self::wait_for_process(&workers)?;

        if std::fs::metadata(&self.spool_path).map(|m| m.len()).unwrap_or(0) == 0 {
            return Err(CaptureError::Encoder(
                "encoder produced no output".to_string(),
            ));
        }

        self.remux(workers.audio_sample_rate)?;
        let blob = ClipBlob::from_file(&self.clip_path)
            .map_err(|e| CaptureError::Encoder(format!("failed to seal clip: {e}")))?;

        tracing::info!(
            "Sealed clip blob: {} bytes from {:?}",
            blob.len(),
            self.workdir.path()
        );
        Ok(blob)
    }

    fn abort(&mut self) {
        self.aborted = true;
        if let Some(workers) = self.shutdown_workers() {
            if let Some(mut child) = workers.process.lock().take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
        // Spool files die with the tempdir.
        tracing::info!("Clip encoder aborted; partial output discarded");
    }
}

impl Drop for FfmpegClipEncoder {
    fn drop(&mut self) {
        if self.workers.is_some() {
            self.abort();
        }
    }
}
