//! FFmpeg-backed clip decoding
//!
//! Probes the clip with ffprobe, then streams raw RGBA frames from an
//! FFmpeg child process. Audio is extracted in one pass as normalized
//! PCM. Local blob paths and remote URLs are both accepted as inputs.

use crate::clip::MediaClip;
use crate::decode::{
    AudioSegment, ClipDecoder, ClipOpener, DecodeError, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE,
};
use std::io::{BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Opens clips through the local FFmpeg installation
#[derive(Debug, Clone, Default)]
pub struct FfmpegClipOpener;

impl ClipOpener for FfmpegClipOpener {
    fn open(&self, clip: &MediaClip) -> Result<Box<dyn ClipDecoder>, DecodeError> {
        let source = clip
            .playable_ref()
            .map_err(|e| DecodeError::SourceUnavailable(e.to_string()))?;
        Ok(Box::new(FfmpegClipDecoder::open(&source)?))
    }
}

/// Streams one clip's frames as raw RGBA
pub struct FfmpegClipDecoder {
    source: String,
    process: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    frame_size: usize,
    frames_read: u64,
}

impl FfmpegClipDecoder {
    pub fn open(source: &str) -> Result<Self, DecodeError> {
        let (width, height, fps) = probe_source(source)?;

        tracing::info!(
            "Opening clip decoder for {}: {}x{} @ {}fps",
            source,
            width,
            height,
            fps
        );

        // Raw RGBA out; -s pins the exact dimensions so every frame is
        // width * height * 4 bytes with no padding.
        let mut process = Command::new("ffmpeg")
            .args([
                "-i",
                source,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{width}x{height}"),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DecodeError::DecodeFailure(format!("failed to start FFmpeg: {e}")))?;

        let frame_size = (width * height * 4) as usize;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| DecodeError::DecodeFailure("failed to capture FFmpeg stdout".into()))?;

        Ok(Self {
            source: source.to_string(),
            process,
            stdout: BufReader::with_capacity(frame_size * 2, stdout),
            width,
            height,
            fps,
            frame_size,
            frames_read: 0,
        })
    }
}

impl ClipDecoder for FfmpegClipDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
        let mut buffer = vec![0u8; self.frame_size];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(Some(buffer))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of clip; a clip that produced nothing at all is
                // undecodable, not empty.
                if self.frames_read == 0 {
                    Err(DecodeError::DecodeFailure(format!(
                        "{} produced no frames",
                        self.source
                    )))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(DecodeError::DecodeFailure(format!(
                "failed to read frame: {e}"
            ))),
        }
    }

    fn decode_audio(&mut self) -> Result<AudioSegment, DecodeError> {
        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &self.source,
                "-vn",
                "-f",
                "s16le",
                "-acodec",
                "pcm_s16le",
                "-ar",
                &AUDIO_SAMPLE_RATE.to_string(),
                "-ac",
                &AUDIO_CHANNELS.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| DecodeError::DecodeFailure(format!("failed to extract audio: {e}")))?;

        if !output.status.success() {
            // Video-only clips are legitimate; they contribute silence
            tracing::warn!("No decodable audio in {}, using empty segment", self.source);
            return Ok(AudioSegment::default());
        }

        let samples: Vec<i16> = output
            .stdout
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Ok(AudioSegment::new(samples))
    }
}

impl Drop for FfmpegClipDecoder {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Probe a source for dimensions and frame rate
fn probe_source(source: &str) -> Result<(u32, u32, f64), DecodeError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "csv=p=0",
            source,
        ])
        .output()
        .map_err(|e| DecodeError::DecodeFailure(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DecodeError::DecodeFailure(format!(
            "ffprobe failed for {source}: {stderr}"
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_line(stdout.trim())
}

fn parse_probe_line(line: &str) -> Result<(u32, u32, f64), DecodeError> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 3 {
        return Err(DecodeError::DecodeFailure(format!(
            "unexpected ffprobe output: {line}"
        )));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| DecodeError::DecodeFailure("invalid width".into()))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| DecodeError::DecodeFailure("invalid height".into()))?;

    // Frame rate comes as "30/1" or "30000/1001"
    let fps_parts: Vec<&str> = parts[2].split('/').collect();
    let fps = if fps_parts.len() == 2 {
        let num: f64 = fps_parts[0].parse().unwrap_or(30.0);
        let den: f64 = fps_parts[1].parse().unwrap_or(1.0);
        if den > 0.0 {
            num / den
        } else {
            30.0
        }
    } else {
        parts[2].parse().unwrap_or(30.0)
    };

    if width == 0 || height == 0 || fps <= 0.0 {
        return Err(DecodeError::DecodeFailure(format!(
            "degenerate stream metadata: {line}"
        )));
    }

    Ok((width, height, fps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_line_parsing() {
        assert_eq!(
            parse_probe_line("1920,1080,30/1").unwrap(),
            (1920, 1080, 30.0)
        );
        let (_, _, fps) = parse_probe_line("1280,720,30000/1001").unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn probe_line_rejects_garbage() {
        assert!(parse_probe_line("").is_err());
        assert!(parse_probe_line("1920,1080").is_err());
        assert!(parse_probe_line("0,0,30/1").is_err());
    }
}
