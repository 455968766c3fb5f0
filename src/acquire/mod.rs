//! Media acquisition
//!
//! Wraps camera/microphone access behind the [`MediaDevice`] seam and a
//! scoped [`MediaStream`] handle the caller must release on every exit
//! path.

pub mod camera;
pub mod device;
pub mod microphone;
pub mod traits;

pub use device::CameraMicDevice;
pub use traits::{
    AcquireError, AudioTrack, MediaConstraints, MediaDevice, MediaStream, VideoFrame, VideoTrack,
};
