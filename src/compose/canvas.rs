//! Fixed-resolution RGBA frame canvas
//!
//! The shared draw target both pipelines render into. One canvas per job;
//! the orchestrator owns it for the job's duration.

use crate::compose::letterbox::LetterboxTransform;
use crate::compose::watermark::OverlayImage;

/// An RGBA pixel buffer at the job's output resolution
pub struct FrameCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; (width * height * 4) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Fill the whole canvas with opaque black
    pub fn clear_black(&mut self) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
            pixel[3] = 255;
        }
    }

    /// Draw a source frame through a letterbox transform
    ///
    /// Nearest-neighbor sampling; the output is always fully opaque.
    pub fn draw_frame(
        &mut self,
        frame: &[u8],
        frame_width: u32,
        frame_height: u32,
        transform: &LetterboxTransform,
    ) {
        if transform.dst_width == 0 || transform.dst_height == 0 {
            return;
        }
        let expected = (frame_width * frame_height * 4) as usize;
        if frame.len() != expected {
            tracing::warn!(
                "Frame size mismatch: got {} bytes, expected {} ({}x{}x4)",
                frame.len(),
                expected,
                frame_width,
                frame_height
            );
            return;
        }

        for dy in 0..transform.dst_height {
            let canvas_y = transform.dst_y + dy;
            if canvas_y >= self.height {
                continue;
            }
            let src_y = ((dy as u64 * frame_height as u64) / transform.dst_height as u64) as u32;
            let src_y = src_y.min(frame_height - 1);

            for dx in 0..transform.dst_width {
                let canvas_x = transform.dst_x + dx;
                if canvas_x >= self.width {
                    continue;
                }
                let src_x = ((dx as u64 * frame_width as u64) / transform.dst_width as u64) as u32;
                let src_x = src_x.min(frame_width - 1);

                let src_idx = ((src_y * frame_width + src_x) * 4) as usize;
                let dst_idx = ((canvas_y * self.width + canvas_x) * 4) as usize;

                self.pixels[dst_idx] = frame[src_idx];
                self.pixels[dst_idx + 1] = frame[src_idx + 1];
                self.pixels[dst_idx + 2] = frame[src_idx + 2];
                self.pixels[dst_idx + 3] = 255;
            }
        }
    }

    /// Alpha-blend an overlay image at a fixed position
    pub fn blend_overlay(&mut self, overlay: &OverlayImage, at_x: i64, at_y: i64) {
        for oy in 0..overlay.height as i64 {
            let canvas_y = at_y + oy;
            if canvas_y < 0 || canvas_y >= self.height as i64 {
                continue;
            }
            for ox in 0..overlay.width as i64 {
                let canvas_x = at_x + ox;
                if canvas_x < 0 || canvas_x >= self.width as i64 {
                    continue;
                }

                let src_idx = ((oy as u32 * overlay.width + ox as u32) * 4) as usize;
                let dst_idx = ((canvas_y as u32 * self.width + canvas_x as u32) * 4) as usize;
                if src_idx + 3 >= overlay.data.len() || dst_idx + 3 >= self.pixels.len() {
                    continue;
                }

                let src_a = overlay.data[src_idx + 3] as f32 / 255.0;
                if src_a < 0.01 {
                    continue;
                }

                for c in 0..3 {
                    let src = overlay.data[src_idx + c] as f32;
                    let dst = self.pixels[dst_idx + c] as f32;
                    let out = src * src_a + dst * (1.0 - src_a);
                    self.pixels[dst_idx + c] = out.clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }
}
