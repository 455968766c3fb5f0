//! Capture session state machine
//!
//! One session per recording attempt: Idle → Countdown → Recording →
//! Stopped, driven at one-second granularity. The session owns the device
//! stream and releases it on every exit path (stop, cancel, terminal
//! error) so no path can leave the hardware indicator on.

use crate::acquire::traits::MediaStream;
use crate::capture::encoder::{ClipEncoder, MediaChunk};
use crate::capture::state::{
    CaptureConfig, CaptureError, CaptureEvent, CapturePhase, CaptureResult,
};
use crate::clip::MediaClip;
use tokio::sync::broadcast;

/// Consecutive fragment-less recording ticks tolerated before the stream
/// is considered lost
const STALL_TICKS: u32 = 3;

/// Outcome of one session tick
#[derive(Debug)]
pub enum Tick {
    /// Countdown continues with this many seconds remaining
    Countdown(u32),
    /// Countdown expired and the encoder started
    RecordingStarted,
    /// One more second recorded
    Recording { elapsed_seconds: u32 },
    /// The max-duration cap forced a stop; the clip is sealed
    AutoStopped(CompletedClip),
}

/// A sealed recording handed to the review step
#[derive(Debug)]
pub struct CompletedClip {
    pub clip: MediaClip,
    pub duration_seconds: u32,
    pub fragment_count: usize,
}

/// State machine producing one clip blob per recording attempt
pub struct CaptureSession {
    config: CaptureConfig,
    phase: CapturePhase,
    countdown_remaining: u32,
    elapsed_seconds: u32,
    chunks: Vec<MediaChunk>,
    sealed: bool,
    empty_polls: u32,
    stream: Option<MediaStream>,
    encoder: Box<dyn ClipEncoder>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureSession {
    /// Create a session over an acquired stream
    pub fn new(stream: MediaStream, encoder: Box<dyn ClipEncoder>, config: CaptureConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            countdown_remaining: config.countdown_ticks,
            config,
            phase: CapturePhase::Idle,
            elapsed_seconds: 0,
            chunks: Vec::new(),
            sealed: false,
            empty_polls: 0,
            stream: Some(stream),
            encoder,
            event_tx,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    /// 0 for the primary question, 1 for the bonus prompt
    pub fn prompt_index(&self) -> usize {
        self.config.prompts.index_at(self.elapsed_seconds)
    }

    /// The prompt to display right now
    pub fn current_prompt(&self) -> &str {
        self.config.prompts.prompt_at(self.elapsed_seconds)
    }

    /// Number of accumulated encoded fragments
    pub fn fragment_count(&self) -> usize {
        self.chunks.len()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Start the countdown; requires a live stream
    pub fn begin(&mut self) -> CaptureResult<()> {
        match self.phase {
            CapturePhase::Idle => {}
            CapturePhase::Stopped => return Err(CaptureError::SessionComplete),
            _ => return Err(CaptureError::AlreadyStarted),
        }
        let live = self.stream.as_ref().map(|s| s.is_live()).unwrap_or(false);
        if !live {
            return Err(CaptureError::StreamNotLive);
        }

        self.phase = CapturePhase::Countdown;
        self.countdown_remaining = self.config.countdown_ticks;
        tracing::info!(
            "Capture countdown started ({} ticks, cap {}s)",
            self.countdown_remaining,
            self.config.max_duration_seconds
        );
        let _ = self
            .event_tx
            .send(CaptureEvent::CountdownTick(self.countdown_remaining));
        Ok(())
    }

    /// Advance one second of wall-clock time
    pub fn tick(&mut self) -> CaptureResult<Tick> {
        match self.phase {
            CapturePhase::Idle => Err(CaptureError::NotRecording),
            CapturePhase::Stopped => Err(CaptureError::SessionComplete),
            CapturePhase::Countdown => self.tick_countdown(),
            CapturePhase::Recording => self.tick_recording(),
        }
    }

    fn tick_countdown(&mut self) -> CaptureResult<Tick> {
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining > 0 {
            let _ = self
                .event_tx
                .send(CaptureEvent::CountdownTick(self.countdown_remaining));
            return Ok(Tick::Countdown(self.countdown_remaining));
        }

        // Countdown expired: start the encoder against the stream
        let stream = self.stream.as_mut().ok_or(CaptureError::StreamNotLive)?;
        if !stream.is_live() {
            return self.fail(CaptureError::StreamLost("stream died during countdown".into()));
        }
        if let Err(e) = self.encoder.start(stream) {
            return self.fail(e);
        }

        self.phase = CapturePhase::Recording;
        self.elapsed_seconds = 0;
        tracing::info!("Recording started");
        let _ = self.event_tx.send(CaptureEvent::RecordingStarted);
        Ok(Tick::RecordingStarted)
    }

    fn tick_recording(&mut self) -> CaptureResult<Tick> {
        let was_bonus = self.config.prompts.is_bonus(self.elapsed_seconds);
        self.elapsed_seconds += 1;

        if let Some(stream) = &self.stream {
            if !stream.is_live() {
                return self.fail(CaptureError::StreamLost(
                    "stream released mid-recording".into(),
                ));
            }
        }

        match self.encoder.poll() {
            Ok(fragments) if fragments.is_empty() => {
                self.empty_polls += 1;
                if self.empty_polls >= STALL_TICKS {
                    return self.fail(CaptureError::StreamLost(format!(
                        "no encoded fragments for {STALL_TICKS}s"
                    )));
                }
            }
            Ok(fragments) => {
                self.empty_polls = 0;
                self.chunks.extend(fragments);
            }
            Err(e) => return self.fail(e),
        }

        if !was_bonus && self.config.prompts.is_bonus(self.elapsed_seconds) {
            tracing::debug!(
                "Prompt switched to bonus question at {}s",
                self.elapsed_seconds
            );
            let _ = self.event_tx.send(CaptureEvent::PromptSwitched);
        }

        if self.elapsed_seconds >= self.config.max_duration_seconds {
            tracing::info!(
                "Max duration {}s reached, auto-stopping",
                self.config.max_duration_seconds
            );
            let clip = self.finalize()?;
            return Ok(Tick::AutoStopped(clip));
        }

        Ok(Tick::Recording {
            elapsed_seconds: self.elapsed_seconds,
        })
    }

    /// Stop recording manually and seal the clip
    pub fn stop(&mut self) -> CaptureResult<CompletedClip> {
        if self.phase != CapturePhase::Recording {
            return Err(CaptureError::NotRecording);
        }
        // A completed session always has a positive duration; stopping
        // before the first recorded second is refused, not sealed.
        if self.elapsed_seconds == 0 {
            return Err(CaptureError::NothingRecorded);
        }
        self.finalize()
    }

    /// Cancel at any phase: discard fragments, release the stream, no clip
    pub fn cancel(&mut self) {
        if self.phase == CapturePhase::Stopped {
            return;
        }
        tracing::info!("Capture cancelled at {:?}", self.phase);
        self.encoder.abort();
        self.chunks.clear();
        self.release_stream();
        self.phase = CapturePhase::Stopped;
        let _ = self.event_tx.send(CaptureEvent::Cancelled);
    }

    /// Drive the session to its cap on a one-second interval
    ///
    /// Convenience driver for headless use; interactive callers own their
    /// timer and call [`CaptureSession::tick`] / [`CaptureSession::stop`]
    /// themselves.
    pub async fn run_to_cap(&mut self) -> CaptureResult<CompletedClip> {
        if self.phase == CapturePhase::Idle {
            self.begin()?;
        }
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            if let Tick::AutoStopped(clip) = self.tick()? {
                return Ok(clip);
            }
        }
    }

    fn finalize(&mut self) -> CaptureResult<CompletedClip> {
        // Drain any trailing fragments before sealing
        if let Ok(fragments) = self.encoder.poll() {
            self.chunks.extend(fragments);
        }
        self.sealed = true;

        let blob = match self.encoder.finish() {
            Ok(blob) => blob,
            Err(e) => return self.fail(e),
        };
        self.release_stream();
        self.phase = CapturePhase::Stopped;

        let duration_seconds = self.elapsed_seconds;
        tracing::info!(
            "Recording stopped: {}s, {} fragments, {} bytes",
            duration_seconds,
            self.chunks.len(),
            blob.len()
        );
        let _ = self
            .event_tx
            .send(CaptureEvent::RecordingStopped { duration_seconds });

        Ok(CompletedClip {
            clip: MediaClip::local(blob).with_duration_hint(duration_seconds as f64),
            duration_seconds,
            fragment_count: self.chunks.len(),
        })
    }

    /// Terminal failure: discard everything, release the stream, stop
    fn fail<T>(&mut self, error: CaptureError) -> CaptureResult<T> {
        tracing::error!("Capture failed: {}", error);
        self.encoder.abort();
        self.chunks.clear();
        self.release_stream();
        self.phase = CapturePhase::Stopped;
        let _ = self.event_tx.send(CaptureEvent::Error(error.to_string()));
        Err(error)
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Unmount-equivalent teardown: never leave the device running
        self.release_stream();
    }
}
