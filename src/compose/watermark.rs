//! Watermark overlay
//!
//! A pre-rendered RGBA raster (brand text) burned into every composited
//! frame at an anchored position. Loaded from PNG; custom-branding plans
//! swap the raster, not the pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Watermark loading errors
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG decode error: {0}")]
    Png(String),

    #[error("Unsupported PNG color type: {0}")]
    UnsupportedColorType(String),
}

/// An RGBA raster ready to blend onto the canvas
#[derive(Debug, Clone)]
pub struct OverlayImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OverlayImage {
    /// Load an overlay from a PNG file
    pub fn from_png_path(path: &Path) -> Result<Self, WatermarkError> {
        let file = std::fs::File::open(path)?;
        Self::from_png_reader(file)
    }

    /// Load an overlay from in-memory PNG bytes
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, WatermarkError> {
        Self::from_png_reader(bytes)
    }

    fn from_png_reader(reader: impl std::io::Read) -> Result<Self, WatermarkError> {
        let decoder = png::Decoder::new(reader);
        let mut reader = decoder
            .read_info()
            .map_err(|e| WatermarkError::Png(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| WatermarkError::Png(e.to_string()))?;

        let data = match info.color_type {
            png::ColorType::Rgba => buf[..info.buffer_size()].to_vec(),
            png::ColorType::Rgb => {
                let rgb = &buf[..info.buffer_size()];
                let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
                for chunk in rgb.chunks(3) {
                    rgba.extend_from_slice(chunk);
                    rgba.push(255);
                }
                rgba
            }
            other => {
                return Err(WatermarkError::UnsupportedColorType(format!("{other:?}")));
            }
        };

        Ok(Self {
            data,
            width: info.width,
            height: info.height,
        })
    }
}

/// Canvas corner the watermark is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A fixed-position overlay applied to every composited frame
#[derive(Debug, Clone)]
pub struct Watermark {
    pub image: OverlayImage,
    pub anchor: WatermarkAnchor,
    pub margin: u32,
}

impl Watermark {
    pub fn new(image: OverlayImage) -> Self {
        Self {
            image,
            anchor: WatermarkAnchor::BottomRight,
            margin: 20,
        }
    }

    pub fn with_anchor(mut self, anchor: WatermarkAnchor, margin: u32) -> Self {
        self.anchor = anchor;
        self.margin = margin;
        self
    }

    /// Top-left placement of the overlay on a canvas of the given size
    pub fn position(&self, canvas_width: u32, canvas_height: u32) -> (i64, i64) {
        let margin = self.margin as i64;
        let w = self.image.width as i64;
        let h = self.image.height as i64;
        let cw = canvas_width as i64;
        let ch = canvas_height as i64;

        match self.anchor {
            WatermarkAnchor::TopLeft => (margin, margin),
            WatermarkAnchor::TopRight => (cw - w - margin, margin),
            WatermarkAnchor::BottomLeft => (margin, ch - h - margin),
            WatermarkAnchor::BottomRight => (cw - w - margin, ch - h - margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(width: u32, height: u32) -> OverlayImage {
        OverlayImage {
            data: vec![255u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    #[test]
    fn anchored_positions() {
        let mark = Watermark::new(overlay(100, 40));
        assert_eq!(mark.position(1280, 720), (1160, 660));

        let mark = mark.with_anchor(WatermarkAnchor::TopLeft, 10);
        assert_eq!(mark.position(1280, 720), (10, 10));

        let mark = mark.with_anchor(WatermarkAnchor::BottomLeft, 0);
        assert_eq!(mark.position(1280, 720), (0, 680));
    }

    #[test]
    fn oversized_watermark_goes_negative_not_panicking() {
        let mark = Watermark::new(overlay(2000, 40));
        let (x, _) = mark.position(1280, 720);
        assert!(x < 0);
    }

    #[test]
    fn png_roundtrip() {
        // Encode a tiny RGBA PNG in memory, then load it back
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&[255u8; 16])
                .unwrap();
        }

        let image = OverlayImage::from_png_bytes(&bytes).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.data.len(), 16);
        assert_eq!(image.data[3], 255);
    }
}
