//! Off-screen playback compositor
//!
//! Plays one clip at a time onto the shared canvas: per output tick the
//! latest decoded frame is letterboxed onto black and the watermark is
//! blended in, then the finished canvas is handed to the frame sink.
//! Pacing is tied to the output tick rate, so composited duration tracks
//! real playback duration regardless of each source's native rate.

use crate::compose::canvas::FrameCanvas;
use crate::compose::letterbox::LetterboxTransform;
use crate::compose::watermark::Watermark;
use crate::decode::{ClipDecoder, DecodeError};
use crate::mux::MuxError;
use thiserror::Error;

/// Errors raised while compositing one clip
#[derive(Error, Debug)]
pub enum CompositeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Mux(#[from] MuxError),
}

/// Draws clips frame by frame onto a fixed-resolution canvas
pub struct PlaybackCompositor {
    canvas: FrameCanvas,
    watermark: Option<Watermark>,
    target_fps: u32,
}

impl PlaybackCompositor {
    pub fn new(width: u32, height: u32, target_fps: u32, watermark: Option<Watermark>) -> Self {
        Self {
            canvas: FrameCanvas::new(width, height),
            watermark,
            target_fps: target_fps.max(1),
        }
    }

    /// Composite one clip to completion, feeding every canvas frame to
    /// `sink`; returns the number of output frames produced
    ///
    /// The draw loop runs one tick at a time: source frames are pulled
    /// until they catch up with the tick's timestamp, then the newest one
    /// is drawn. A source faster than the target rate drops frames; a
    /// slower one holds frames across ticks.
    pub fn composite_clip(
        &mut self,
        decoder: &mut dyn ClipDecoder,
        sink: &mut dyn FnMut(&[u8]) -> Result<(), MuxError>,
    ) -> Result<u64, CompositeError> {
        let (frame_width, frame_height) = decoder.dimensions();
        let source_fps = decoder.fps().max(1.0);
        let transform = LetterboxTransform::compute(
            frame_width,
            frame_height,
            self.canvas.width(),
            self.canvas.height(),
        );

        let mut frames_out: u64 = 0;
        let mut frames_in: u64 = 0;
        let mut current: Option<Vec<u8>> = None;
        let mut end_of_stream = false;

        loop {
            let tick_seconds = frames_out as f64 / self.target_fps as f64;

            // Pull source frames up to this tick's timestamp
            while !end_of_stream && frames_in as f64 / source_fps <= tick_seconds {
                match decoder.read_frame()? {
                    Some(frame) => {
                        current = Some(frame);
                        frames_in += 1;
                    }
                    None => end_of_stream = true,
                }
            }

            let Some(frame) = current.as_deref() else {
                // Nothing ever decoded
                break;
            };

            // Once the source is drained, stop after covering its duration
            if end_of_stream && tick_seconds >= frames_in as f64 / source_fps {
                break;
            }

            self.canvas.clear_black();
            self.canvas
                .draw_frame(frame, frame_width, frame_height, &transform);
            if let Some(mark) = &self.watermark {
                let (x, y) = mark.position(self.canvas.width(), self.canvas.height());
                self.canvas.blend_overlay(&mark.image, x, y);
            }
            sink(self.canvas.pixels())?;
            frames_out += 1;
        }

        tracing::debug!(
            "Composited clip: {} source frames @ {:.2}fps -> {} output frames @ {}fps",
            frames_in,
            source_fps,
            frames_out,
            self.target_fps
        );
        Ok(frames_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::AudioSegment;

    /// Decoder double yielding N solid-color frames
    struct FakeDecoder {
        width: u32,
        height: u32,
        fps: f64,
        remaining: u64,
        color: [u8; 4],
    }

    impl FakeDecoder {
        fn new(width: u32, height: u32, fps: f64, frames: u64, color: [u8; 4]) -> Self {
            Self {
                width,
                height,
                fps,
                remaining: frames,
                color,
            }
        }
    }

    impl ClipDecoder for FakeDecoder {
        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn fps(&self) -> f64 {
            self.fps
        }

        fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let mut frame = Vec::with_capacity((self.width * self.height * 4) as usize);
            for _ in 0..(self.width * self.height) {
                frame.extend_from_slice(&self.color);
            }
            Ok(Some(frame))
        }

        fn decode_audio(&mut self) -> Result<AudioSegment, DecodeError> {
            Ok(AudioSegment::default())
        }
    }

    #[test]
    fn matching_rates_pass_frames_through() {
        let mut compositor = PlaybackCompositor::new(16, 16, 10, None);
        let mut decoder = FakeDecoder::new(16, 16, 10.0, 30, [10, 20, 30, 255]);
        let mut sunk = 0u64;
        let frames = compositor
            .composite_clip(&mut decoder, &mut |_| {
                sunk += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(frames, 30);
        assert_eq!(sunk, 30);
    }

    #[test]
    fn slow_source_frames_are_held() {
        // 2 seconds of 5fps source at 30fps output = 60 output frames
        let mut compositor = PlaybackCompositor::new(16, 16, 30, None);
        let mut decoder = FakeDecoder::new(16, 16, 5.0, 10, [0, 0, 0, 255]);
        let frames = compositor.composite_clip(&mut decoder, &mut |_| Ok(())).unwrap();
        assert_eq!(frames, 60);
    }

    #[test]
    fn fast_source_frames_are_dropped() {
        // 1 second of 60fps source at 30fps output = 30 output frames
        let mut compositor = PlaybackCompositor::new(16, 16, 30, None);
        let mut decoder = FakeDecoder::new(16, 16, 60.0, 60, [0, 0, 0, 255]);
        let frames = compositor.composite_clip(&mut decoder, &mut |_| Ok(())).unwrap();
        assert_eq!(frames, 30);
    }

    #[test]
    fn empty_source_produces_no_frames() {
        let mut compositor = PlaybackCompositor::new(16, 16, 30, None);
        let mut decoder = FakeDecoder::new(16, 16, 30.0, 0, [0, 0, 0, 255]);
        let frames = compositor.composite_clip(&mut decoder, &mut |_| Ok(())).unwrap();
        assert_eq!(frames, 0);
    }

    #[test]
    fn sink_errors_propagate() {
        let mut compositor = PlaybackCompositor::new(16, 16, 30, None);
        let mut decoder = FakeDecoder::new(16, 16, 30.0, 10, [0, 0, 0, 255]);
        let result = compositor.composite_clip(&mut decoder, &mut |_| {
            Err(MuxError::Encoding("disk full".to_string()))
        });
        assert!(matches!(result, Err(CompositeError::Mux(_))));
    }

    #[test]
    fn output_is_letterboxed_and_watermarked() {
        use crate::compose::watermark::{OverlayImage, Watermark, WatermarkAnchor};

        let mark = Watermark::new(OverlayImage {
            data: vec![255u8; 4],
            width: 1,
            height: 1,
        })
        .with_anchor(WatermarkAnchor::TopLeft, 0);

        let mut compositor = PlaybackCompositor::new(8, 8, 10, Some(mark));
        // 2:1 red source: rows 0-1 and 6-7 stay black
        let mut decoder = FakeDecoder::new(4, 2, 10.0, 1, [255, 0, 0, 255]);
        let mut captured: Vec<u8> = Vec::new();
        compositor
            .composite_clip(&mut decoder, &mut |pixels| {
                captured = pixels.to_vec();
                Ok(())
            })
            .unwrap();

        let pixel = |x: u32, y: u32| {
            let idx = ((y * 8 + x) * 4) as usize;
            [captured[idx], captured[idx + 1], captured[idx + 2]]
        };
        // Watermark at the very corner (over the top bar)
        assert_eq!(pixel(0, 0), [255, 255, 255]);
        // Bar pixel next to it
        assert_eq!(pixel(1, 0), [0, 0, 0]);
        // Frame area
        assert_eq!(pixel(4, 4), [255, 0, 0]);
    }
}
