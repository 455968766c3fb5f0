//! FFmpeg-backed stream muxer
//!
//! Canvas frames stream into an FFmpeg encoder child over stdin; decoded
//! clip audio accumulates append-ordered in a PCM spool. Closing the
//! session flushes the encoder and muxes both into the single output
//! file.

use crate::clip::ClipBlob;
use crate::decode::{AudioSegment, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use crate::mux::{EncodeTarget, MuxError, MuxerBackend, StreamMuxer, TargetContainer};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use tempfile::TempDir;

/// Opens [`FfmpegStreamMuxer`] sessions
#[derive(Debug, Clone, Default)]
pub struct FfmpegMuxerBackend;

impl MuxerBackend for FfmpegMuxerBackend {
    fn open(&self, target: &EncodeTarget) -> Result<Box<dyn StreamMuxer>, MuxError> {
        Ok(Box::new(FfmpegStreamMuxer::open(target)?))
    }
}

/// One recordable FFmpeg session
pub struct FfmpegStreamMuxer {
    target: EncodeTarget,
    workdir: TempDir,
    video_path: PathBuf,
    audio_path: PathBuf,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    audio_spool: std::fs::File,
    frames: u64,
    audio_bytes: u64,
}

impl FfmpegStreamMuxer {
    /// Validate the target and spawn the encoder child
    ///
    /// Both failure modes (unsupported target, unspawnable encoder)
    /// surface here, before any clip has been decoded.
    pub fn open(target: &EncodeTarget) -> Result<Self, MuxError> {
        target.validate()?;

        let workdir = TempDir::new()?;
        let video_path = workdir
            .path()
            .join(format!("video-track.{}", target.container.extension()));
        let audio_path = workdir.path().join("audio-track.pcm");

        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", target.width, target.height),
            "-r".to_string(),
            target.frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            target.codec.ffmpeg_encoder().to_string(),
        ];
        match target.container {
            TargetContainer::Mp4 => {
                args.extend(
                    [
                        "-preset",
                        "veryfast",
                        "-crf",
                        "23",
                        "-pix_fmt",
                        "yuv420p",
                        "-movflags",
                        "+faststart",
                    ]
                    .map(String::from),
                );
            }
            TargetContainer::Webm => {
                args.extend(["-crf", "23", "-b:v", "0", "-pix_fmt", "yuv420p"].map(String::from));
            }
        }
        args.push(video_path.to_string_lossy().to_string());

        tracing::info!("Starting FFmpeg muxer session: {:?}", args);

        let mut process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MuxError::EncoderUnsupported(format!("cannot start FFmpeg encoder: {e}"))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MuxError::Encoding("failed to capture FFmpeg stdin".to_string()))?;

        let audio_spool = std::fs::File::create(&audio_path)?;

        Ok(Self {
            target: target.clone(),
            workdir,
            video_path,
            audio_path,
            process: Some(process),
            stdin: Some(stdin),
            audio_spool,
            frames: 0,
            audio_bytes: 0,
        })
    }
}

impl StreamMuxer for FfmpegStreamMuxer {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MuxError> {
        if rgba.len() != self.target.frame_bytes() {
            return Err(MuxError::Encoding(format!(
                "frame size mismatch: got {} bytes, expected {}",
                rgba.len(),
                self.target.frame_bytes()
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MuxError::Encoding("muxer already closed".to_string()))?;
        stdin
            .write_all(rgba)
            .map_err(|e| MuxError::Encoding(format!("failed to write frame: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    fn write_audio(&mut self, segment: &AudioSegment) -> Result<(), MuxError> {
        if segment.is_empty() {
            return Ok(());
        }
        if segment.sample_rate != AUDIO_SAMPLE_RATE || segment.channels != AUDIO_CHANNELS {
            return Err(MuxError::Encoding(format!(
                "audio segment not normalized: {} Hz / {} ch",
                segment.sample_rate, segment.channels
            )));
        }
        let mut bytes = Vec::with_capacity(segment.samples.len() * 2);
        for sample in &segment.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        self.audio_spool
            .write_all(&bytes)
            .map_err(|e| MuxError::Encoding(format!("failed to spool audio: {e}")))?;
        self.audio_bytes += bytes.len() as u64;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn close(mut self: Box<Self>) -> Result<ClipBlob, MuxError> {
        // EOF the encoder and let it flush
        drop(self.stdin.take());
        let process = self
            .process
            .take()
            .ok_or_else(|| MuxError::Encoding("muxer already closed".to_string()))?;
        let output = process
            .wait_with_output()
            .map_err(|e| MuxError::Encoding(format!("failed to wait for FFmpeg: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::Encoding(format!(
                "FFmpeg encoder exited with error: {stderr}"
            )));
        }
        self.audio_spool
            .flush()
            .map_err(|e| MuxError::Encoding(format!("failed to flush audio spool: {e}")))?;

        let out_path = self
            .workdir
            .path()
            .join(format!("keepsake.{}", self.target.container.extension()));

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-i"]).arg(&self.video_path);
        if self.audio_bytes > 0 {
            cmd.args([
                "-f",
                "s16le",
                "-ar",
                &AUDIO_SAMPLE_RATE.to_string(),
                "-ac",
                &AUDIO_CHANNELS.to_string(),
                "-i",
            ])
            .arg(&self.audio_path)
            .args([
                "-c:v",
                "copy",
                "-c:a",
                self.target.container.audio_codec(),
                "-b:a",
                "192k",
                "-shortest",
            ]);
        } else {
            cmd.args(["-c", "copy"]);
        }
        cmd.arg(&out_path);

        let mux_output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| MuxError::Encoding(format!("failed to run final mux: {e}")))?;
        if !mux_output.status.success() {
            let stderr = String::from_utf8_lossy(&mux_output.stderr);
            return Err(MuxError::Encoding(format!("final mux failed: {stderr}")));
        }

        let blob = ClipBlob::from_file(&out_path)
            .map_err(|e| MuxError::Encoding(format!("failed to collect output: {e}")))?;
        tracing::info!(
            "Muxer closed: {} frames, {} audio bytes, output {} bytes",
            self.frames,
            self.audio_bytes,
            blob.len()
        );
        Ok(blob)
    }
}

impl Drop for FfmpegStreamMuxer {
    fn drop(&mut self) {
        // A dropped-but-unclosed session is a discarded job: kill the
        // encoder and let the tempdir take the partial output with it.
        if let Some(mut process) = self.process.take() {
            drop(self.stdin.take());
            let _ = process.kill();
            let _ = process.wait();
            tracing::debug!("Discarded unfinished muxer session");
        }
    }
}
