//! Canvas compositing
//!
//! Draws decoded clip frames onto a shared fixed-resolution canvas:
//! letterboxed, centered on black, watermark burned in.

pub mod canvas;
pub mod compositor;
pub mod letterbox;
pub mod watermark;

pub use canvas::FrameCanvas;
pub use compositor::{CompositeError, PlaybackCompositor};
pub use letterbox::LetterboxTransform;
pub use watermark::{OverlayImage, Watermark, WatermarkAnchor, WatermarkError};
