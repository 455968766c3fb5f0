//! Async compilation front
//!
//! Owns the single-flight guard, runs the orchestrator on the blocking
//! pool, and broadcasts progress events for UI polling. There is no
//! mid-job cancel: jobs are bounded by the total clip duration.

use crate::clip::MediaClip;
use crate::compile::job::{CompileError, CompileEvent};
use crate::compile::orchestrator::{CompilationOrchestrator, CompileOutput};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// State for tracking the active compilation job
pub struct CompileService {
    is_compiling: Arc<AtomicBool>,
    event_tx: broadcast::Sender<CompileEvent>,
    output: Arc<Mutex<Option<CompileOutput>>>,
}

impl CompileService {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            is_compiling: Arc::new(AtomicBool::new(false)),
            event_tx,
            output: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a job is currently running
    pub fn is_compiling(&self) -> bool {
        self.is_compiling.load(Ordering::Relaxed)
    }

    /// Subscribe to job events
    pub fn subscribe(&self) -> broadcast::Receiver<CompileEvent> {
        self.event_tx.subscribe()
    }

    /// Take the finished output, if any
    pub fn take_output(&self) -> Option<CompileOutput> {
        self.output.lock().take()
    }

    /// Start a compilation job in the background
    ///
    /// Returns immediately after scheduling; progress and completion
    /// arrive as [`CompileEvent`]s. An empty queue is refused up front so
    /// the guard is never taken for a job that cannot run.
    pub async fn start(
        &self,
        orchestrator: CompilationOrchestrator,
        queue: Vec<MediaClip>,
    ) -> Result<(), CompileError> {
        if queue.is_empty() {
            return Err(CompileError::EmptyQueue);
        }
        if self.is_compiling.swap(true, Ordering::SeqCst) {
            return Err(CompileError::AlreadyCompiling);
        }
        self.output.lock().take();

        let is_compiling = self.is_compiling.clone();
        let event_tx = self.event_tx.clone();
        let output_slot = self.output.clone();

        tracing::info!("Scheduling compilation of {} clips", queue.len());

        tokio::spawn(async move {
            let progress_tx = event_tx.clone();
            let result = tokio::task::spawn_blocking(move || {
                orchestrator.run(&queue, move |progress| {
                    let _ = progress_tx.send(CompileEvent::Progress(progress));
                })
            })
            .await;

            is_compiling.store(false, Ordering::SeqCst);

            match result {
                Ok(Ok(output)) => {
                    tracing::info!("Compilation job finished");
                    let event = CompileEvent::Complete {
                        clip_count: output.clip_count,
                        duration_seconds: output.duration_seconds,
                    };
                    *output_slot.lock() = Some(output);
                    let _ = event_tx.send(event);
                }
                Ok(Err(e)) => {
                    tracing::error!("Compilation failed: {}", e);
                    let _ = event_tx.send(CompileEvent::Failed(e.to_string()));
                }
                Err(e) => {
                    tracing::error!("Compilation task panicked: {}", e);
                    let _ = event_tx.send(CompileEvent::Failed(format!(
                        "compilation task panicked: {e}"
                    )));
                }
            }
        });

        Ok(())
    }
}

impl Default for CompileService {
    fn default() -> Self {
        Self::new()
    }
}
