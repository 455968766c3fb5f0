//! Letterbox transform
//!
//! Uniform scale that fits a source frame inside the canvas while
//! preserving aspect ratio, centered, with the remaining area left to the
//! canvas background.

/// Placement of a scaled source frame on the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f64,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_width: u32,
    pub dst_height: u32,
}

impl LetterboxTransform {
    /// Compute the centered uniform-scale fit of `frame` inside `canvas`
    pub fn compute(
        frame_width: u32,
        frame_height: u32,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Self {
        if frame_width == 0 || frame_height == 0 {
            return Self {
                scale: 0.0,
                dst_x: 0,
                dst_y: 0,
                dst_width: 0,
                dst_height: 0,
            };
        }

        let scale = f64::min(
            canvas_width as f64 / frame_width as f64,
            canvas_height as f64 / frame_height as f64,
        );
        let dst_width = ((frame_width as f64 * scale).round() as u32).min(canvas_width).max(1);
        let dst_height = ((frame_height as f64 * scale).round() as u32)
            .min(canvas_height)
            .max(1);

        Self {
            scale,
            dst_x: (canvas_width - dst_width) / 2,
            dst_y: (canvas_height - dst_height) / 2,
            dst_width,
            dst_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_source_gets_vertical_bars() {
        // 4:1 source into a 16:9 canvas: full width, centered vertically
        let t = LetterboxTransform::compute(1600, 400, 1280, 720);
        assert_eq!(t.dst_width, 1280);
        assert_eq!(t.dst_height, 320);
        assert_eq!(t.dst_x, 0);
        assert_eq!(t.dst_y, 200);
    }

    #[test]
    fn tall_source_gets_horizontal_bars() {
        // Portrait phone clip into a 16:9 canvas
        let t = LetterboxTransform::compute(720, 1280, 1280, 720);
        assert_eq!(t.dst_height, 720);
        assert_eq!(t.dst_width, 405);
        assert_eq!(t.dst_y, 0);
        assert!(t.dst_x > 0);
        assert_eq!(t.dst_x, (1280 - 405) / 2);
    }

    #[test]
    fn exact_fit_fills_canvas() {
        let t = LetterboxTransform::compute(1920, 1080, 1280, 720);
        assert_eq!(t.dst_width, 1280);
        assert_eq!(t.dst_height, 720);
        assert_eq!(t.dst_x, 0);
        assert_eq!(t.dst_y, 0);
        assert!((t.scale - 1280.0 / 1920.0).abs() < 1e-9);
    }

    #[test]
    fn upscales_small_sources() {
        let t = LetterboxTransform::compute(320, 180, 1280, 720);
        assert_eq!(t.dst_width, 1280);
        assert_eq!(t.dst_height, 720);
        assert!(t.scale > 1.0);
    }

    #[test]
    fn degenerate_source_is_empty() {
        let t = LetterboxTransform::compute(0, 0, 1280, 720);
        assert_eq!(t.dst_width, 0);
        assert_eq!(t.dst_height, 0);
    }
}
