//! Compilation orchestration
//!
//! Sequences the compositor over the clip queue and drives the muxer
//! open/close. Clips are composited strictly in queue order; one decode
//! target is active at a time.

use crate::clip::{ClipBlob, MediaClip};
use crate::compile::job::{CompileError, CompileProgress, CompileState, ProgressTracker};
use crate::compose::compositor::PlaybackCompositor;
use crate::compose::watermark::Watermark;
use crate::decode::{ClipOpener, DecodeError};
use crate::mux::{EncodeTarget, MuxerBackend};

/// Result of a finished compilation
#[derive(Debug)]
pub struct CompileOutput {
    pub blob: ClipBlob,
    pub clip_count: usize,
    pub frames_written: u64,
    /// Output duration at the target frame rate
    pub duration_seconds: f64,
}

/// Drives decode → composite → mux over the full clip queue
pub struct CompilationOrchestrator {
    opener: Box<dyn ClipOpener>,
    backend: Box<dyn MuxerBackend>,
    target: EncodeTarget,
    watermark: Option<Watermark>,
}

impl CompilationOrchestrator {
    pub fn new(
        opener: Box<dyn ClipOpener>,
        backend: Box<dyn MuxerBackend>,
        target: EncodeTarget,
        watermark: Option<Watermark>,
    ) -> Self {
        Self {
            opener,
            backend,
            target,
            watermark,
        }
    }

    /// Compile the queue into one output blob
    ///
    /// Fails with `EmptyQueue` before any muxer allocation. Any per-clip
    /// failure aborts the whole job: the muxer session is dropped with its
    /// partial output, later clips are never opened, and no blob escapes.
    pub fn run<F>(&self, queue: &[MediaClip], progress: F) -> Result<CompileOutput, CompileError>
    where
        F: Fn(CompileProgress) + Send,
    {
        if queue.is_empty() {
            return Err(CompileError::EmptyQueue);
        }
        let total = queue.len();

        tracing::info!(
            "Starting compilation: {} clips -> {:?}/{:?} {}x{} @ {}fps",
            total,
            self.target.container,
            self.target.codec,
            self.target.width,
            self.target.height,
            self.target.frame_rate
        );

        // Open the recordable session first so an unsupported target fails
        // before any clip is touched.
        let mut muxer = self.backend.open(&self.target)?;
        let mut compositor = PlaybackCompositor::new(
            self.target.width,
            self.target.height,
            self.target.frame_rate,
            self.watermark.clone(),
        );
        let mut tracker = ProgressTracker::new();
        let mut frames_total: u64 = 0;

        progress(tracker.snapshot(CompileState::Compiling { current_index: 0 }, 0.0, 0, total));

        for (index, clip) in queue.iter().enumerate() {
            tracing::info!("Compositing clip {}/{}", index + 1, total);

            let mut decoder = self.opener.open(clip)?;
            let frames =
                compositor.composite_clip(&mut *decoder, &mut |pixels| muxer.write_frame(pixels))?;
            if frames == 0 {
                return Err(CompileError::Decode(DecodeError::DecodeFailure(format!(
                    "clip {} produced no frames",
                    index + 1
                ))));
            }
            frames_total += frames;

            let audio = decoder.decode_audio()?;
            muxer.write_audio(&audio)?;

            let done = index + 1;
            if done < total {
                progress(tracker.snapshot(
                    CompileState::Compiling {
                        current_index: done,
                    },
                    done as f64 / total as f64,
                    done,
                    total,
                ));
            }
        }

        // Last clip ended: finalize without advancing the reported
        // fraction; 1.0 belongs to Done alone.
        let held = (total - 1) as f64 / total as f64;
        progress(tracker.snapshot(CompileState::Finalizing, held, total, total));

        let blob = muxer.close()?;
        let duration_seconds = frames_total as f64 / self.target.frame_rate as f64;

        progress(tracker.snapshot(CompileState::Done, 1.0, total, total));
        tracing::info!(
            "Compilation complete: {} clips, {} frames, {:.1}s, {} bytes",
            total,
            frames_total,
            duration_seconds,
            blob.len()
        );

        Ok(CompileOutput {
            blob,
            clip_count: total,
            frames_written: frames_total,
            duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{AudioSegment, ClipDecoder};
    use crate::mux::{MuxError, StreamMuxer};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted per-clip behavior for the fake opener
    #[derive(Clone, Copy)]
    enum Script {
        /// Yield this many 30fps frames
        Frames(u64),
        FailOpen,
        FailMidway,
    }

    struct ScriptedDecoder {
        script: Script,
        remaining: u64,
    }

    impl ClipDecoder for ScriptedDecoder {
        fn dimensions(&self) -> (u32, u32) {
            (16, 16)
        }

        fn fps(&self) -> f64 {
            30.0
        }

        fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
            match self.script {
                Script::FailMidway if self.remaining <= 1 => {
                    Err(DecodeError::DecodeFailure("bitstream error".into()))
                }
                _ => {
                    if self.remaining == 0 {
                        return Ok(None);
                    }
                    self.remaining -= 1;
                    Ok(Some(vec![128u8; 16 * 16 * 4]))
                }
            }
        }

        fn decode_audio(&mut self) -> Result<AudioSegment, DecodeError> {
            Ok(AudioSegment::new(vec![0i16; 9600]))
        }
    }

    struct ScriptedOpener {
        scripts: Vec<Script>,
        opens: Arc<AtomicUsize>,
    }

    impl ClipOpener for ScriptedOpener {
        fn open(&self, clip: &MediaClip) -> Result<Box<dyn ClipDecoder>, DecodeError> {
            let index = self.opens.fetch_add(1, Ordering::SeqCst);
            let _ = clip.playable_ref();
            let script = self.scripts[index];
            match script {
                Script::FailOpen => Err(DecodeError::DecodeFailure("unreadable container".into())),
                Script::Frames(n) => Ok(Box::new(ScriptedDecoder {
                    script,
                    remaining: n,
                })),
                Script::FailMidway => Ok(Box::new(ScriptedDecoder {
                    script,
                    remaining: 5,
                })),
            }
        }
    }

    #[derive(Default)]
    struct RecordingMuxer {
        frames: u64,
        audio_segments: usize,
    }

    impl StreamMuxer for RecordingMuxer {
        fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MuxError> {
            assert_eq!(rgba.len(), 16 * 16 * 4);
            self.frames += 1;
            Ok(())
        }

        fn write_audio(&mut self, segment: &AudioSegment) -> Result<(), MuxError> {
            assert!(!segment.is_empty());
            self.audio_segments += 1;
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.frames
        }

        fn close(self: Box<Self>) -> Result<ClipBlob, MuxError> {
            ClipBlob::from_bytes(b"keepsake").map_err(|e| MuxError::Encoding(e.to_string()))
        }
    }

    struct RecordingBackend {
        opens: Arc<AtomicUsize>,
    }

    impl MuxerBackend for RecordingBackend {
        fn open(
            &self,
            target: &EncodeTarget,
        ) -> Result<Box<dyn StreamMuxer>, MuxError> {
            target.validate()?;
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::<RecordingMuxer>::default())
        }
    }

    fn target() -> EncodeTarget {
        EncodeTarget {
            width: 16,
            height: 16,
            frame_rate: 30,
            ..EncodeTarget::default()
        }
    }

    fn orchestrator(
        scripts: Vec<Script>,
    ) -> (CompilationOrchestrator, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let decoder_opens = Arc::new(AtomicUsize::new(0));
        let muxer_opens = Arc::new(AtomicUsize::new(0));
        let orchestrator = CompilationOrchestrator::new(
            Box::new(ScriptedOpener {
                scripts,
                opens: decoder_opens.clone(),
            }),
            Box::new(RecordingBackend {
                opens: muxer_opens.clone(),
            }),
            target(),
            None,
        );
        (orchestrator, decoder_opens, muxer_opens)
    }

    fn queue(n: usize) -> Vec<MediaClip> {
        (0..n)
            .map(|i| MediaClip::remote(format!("clip://{i}")))
            .collect()
    }

    #[test]
    fn empty_queue_fails_without_allocation() {
        let (orchestrator, _, muxer_opens) = orchestrator(vec![]);
        let result = orchestrator.run(&[], |_| {});
        assert!(matches!(result, Err(CompileError::EmptyQueue)));
        assert_eq!(muxer_opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn three_clips_in_order_with_milestones() {
        // 10s, 5s, 8s of 30fps source
        let (orchestrator, _, _) = orchestrator(vec![
            Script::Frames(300),
            Script::Frames(150),
            Script::Frames(240),
        ]);
        let snapshots: Arc<Mutex<Vec<CompileProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();

        let output = orchestrator
            .run(&queue(3), move |p| sink.lock().push(p))
            .unwrap();

        assert_eq!(output.clip_count, 3);
        assert_eq!(output.frames_written, 690);
        assert!((output.duration_seconds - 23.0).abs() < 0.5);

        let snapshots = snapshots.lock();
        let fractions: Vec<f64> = snapshots.iter().map(|p| p.fraction).collect();
        // Non-decreasing throughout
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        // Milestones at roughly 1/3 and 2/3
        assert!(fractions.iter().any(|f| (f - 1.0 / 3.0).abs() < 0.01));
        assert!(fractions.iter().any(|f| (f - 2.0 / 3.0).abs() < 0.01));
        // Exactly 1.0 only at the final Done snapshot
        let last = snapshots.last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.state, CompileState::Done);
        assert!(snapshots[..snapshots.len() - 1]
            .iter()
            .all(|p| p.fraction < 1.0));
        // Finalizing held the last milestone instead of jumping
        let finalizing = snapshots
            .iter()
            .find(|p| p.state == CompileState::Finalizing)
            .unwrap();
        assert!((finalizing.fraction - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn identical_queues_yield_identical_durations() {
        let scripts = vec![Script::Frames(300), Script::Frames(150)];
        let (a, _, _) = orchestrator(scripts.clone());
        let (b, _, _) = orchestrator(scripts);
        let out_a = a.run(&queue(2), |_| {}).unwrap();
        let out_b = b.run(&queue(2), |_| {}).unwrap();
        assert_eq!(out_a.duration_seconds, out_b.duration_seconds);
        assert_eq!(out_a.frames_written, out_b.frames_written);
    }

    #[test]
    fn decode_failure_stops_at_the_failing_clip() {
        let (orchestrator, decoder_opens, _) = orchestrator(vec![
            Script::Frames(30),
            Script::FailOpen,
            Script::Frames(30),
        ]);
        let snapshots: Arc<Mutex<Vec<CompileProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();

        let result = orchestrator.run(&queue(3), move |p| sink.lock().push(p));
        assert!(matches!(result, Err(CompileError::Decode(_))));

        // Clip 3 was never loaded
        assert_eq!(decoder_opens.load(Ordering::SeqCst), 2);
        // Failed never reports 1.0
        assert!(snapshots.lock().iter().all(|p| p.fraction < 1.0));
    }

    #[test]
    fn mid_clip_decode_error_aborts() {
        let (orchestrator, decoder_opens, _) =
            orchestrator(vec![Script::FailMidway, Script::Frames(30)]);
        let result = orchestrator.run(&queue(2), |_| {});
        assert!(matches!(result, Err(CompileError::Decode(_))));
        assert_eq!(decoder_opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_frame_clip_is_a_decode_failure() {
        let (orchestrator, _, _) = orchestrator(vec![Script::Frames(0)]);
        let result = orchestrator.run(&queue(1), |_| {});
        assert!(matches!(
            result,
            Err(CompileError::Decode(DecodeError::DecodeFailure(_)))
        ));
    }
}
