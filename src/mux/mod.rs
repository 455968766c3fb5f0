//! Stream muxing
//!
//! Combines the canvas's rendered frames with decoded clip audio into one
//! encoded output container. The encode target is fixed per job and
//! validated before any clip is touched.

pub mod ffmpeg;

use crate::clip::ClipBlob;
use crate::decode::AudioSegment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ffmpeg::{FfmpegMuxerBackend, FfmpegStreamMuxer};

/// Muxing errors
#[derive(Error, Debug)]
pub enum MuxError {
    /// No recordable session can be constructed for the target
    #[error("Encoder unsupported: {0}")]
    EncoderUnsupported(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output container options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetContainer {
    Mp4,
    Webm,
}

impl TargetContainer {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            TargetContainer::Mp4 => "mp4",
            TargetContainer::Webm => "webm",
        }
    }

    /// Get the FFmpeg audio codec paired with this container
    pub fn audio_codec(&self) -> &'static str {
        match self {
            TargetContainer::Mp4 => "aac",
            TargetContainer::Webm => "libopus",
        }
    }
}

/// Output video codec options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCodec {
    H264,
    Vp8,
    Vp9,
}

impl TargetCodec {
    /// Get the FFmpeg encoder for this codec
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            TargetCodec::H264 => "libx264",
            TargetCodec::Vp8 => "libvpx",
            TargetCodec::Vp9 => "libvpx-vp9",
        }
    }
}

/// Fixed encode parameters for one compilation job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeTarget {
    pub container: TargetContainer,
    pub codec: TargetCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for EncodeTarget {
    fn default() -> Self {
        Self {
            container: TargetContainer::Mp4,
            codec: TargetCodec::H264,
            width: 1280,
            height: 720,
            frame_rate: 30,
        }
    }
}

impl EncodeTarget {
    /// Check the container/codec pairing and the numeric contract
    ///
    /// Runs before any clip is played so an unsupported target fails the
    /// job up front, never mid-compilation.
    pub fn validate(&self) -> Result<(), MuxError> {
        let supported = matches!(
            (self.container, self.codec),
            (TargetContainer::Mp4, TargetCodec::H264)
                | (TargetContainer::Webm, TargetCodec::Vp8)
                | (TargetContainer::Webm, TargetCodec::Vp9)
        );
        if !supported {
            return Err(MuxError::EncoderUnsupported(format!(
                "{:?} does not carry {:?}",
                self.container, self.codec
            )));
        }
        if self.width == 0 || self.height == 0 || self.frame_rate == 0 {
            return Err(MuxError::EncoderUnsupported(format!(
                "degenerate target {}x{} @ {}fps",
                self.width, self.height, self.frame_rate
            )));
        }
        // yuv420p output needs even dimensions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(MuxError::EncoderUnsupported(format!(
                "odd output dimensions {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Bytes per RGBA canvas frame
    pub fn frame_bytes(&self) -> usize {
        (self.width * self.height * 4) as usize
    }
}

/// One recordable output session
///
/// Writing is continuous once the session is open; `close` finalizes the
/// accumulated fragments into a single playable blob, exactly once.
pub trait StreamMuxer: Send {
    /// Append one RGBA canvas frame at the target resolution
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MuxError>;

    /// Append a clip's decoded audio after its frames
    fn write_audio(&mut self, segment: &AudioSegment) -> Result<(), MuxError>;

    /// Frames written so far
    fn frames_written(&self) -> u64;

    /// Finalize into one playable blob
    fn close(self: Box<Self>) -> Result<ClipBlob, MuxError>;
}

/// Constructs muxer sessions for a validated target
pub trait MuxerBackend: Send + Sync {
    fn open(&self, target: &EncodeTarget) -> Result<Box<dyn StreamMuxer>, MuxError>;
}
