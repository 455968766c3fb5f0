//! End-to-end guest recording flow against fake device and encoder
//! backends: acquire → countdown → record → review → submit.

use async_trait::async_trait;
use guestreel::acquire::{MediaConstraints, MediaDevice, MediaStream};
use guestreel::capability::{GuestCapabilities, PlanTier};
use guestreel::capture::{
    CaptureConfig, CaptureError, CapturePhase, CaptureSession, ClipEncoder, MediaChunk,
    PromptSchedule, Tick,
};
use guestreel::clip::ClipBlob;
use guestreel::review::{GuestInfo, ReviewSession, SubmissionRecord, SubmissionSink, SubmitError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Device double that hands out streams with a shared release counter
struct FakeDevice {
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaDevice for FakeDevice {
    async fn acquire(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<MediaStream, guestreel::acquire::AcquireError> {
        let live = Arc::new(AtomicBool::new(true));
        let releases = self.releases.clone();
        Ok(MediaStream::new(None, None, live, move || {
            releases.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Encoder double producing one fragment per recorded second
struct FakeEncoder {
    seq: u64,
}

impl ClipEncoder for FakeEncoder {
    fn start(&mut self, _stream: &mut MediaStream) -> Result<(), CaptureError> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<MediaChunk>, CaptureError> {
        let chunk = MediaChunk {
            seq: self.seq,
            len: 2048,
        };
        self.seq += 1;
        Ok(vec![chunk])
    }

    fn finish(&mut self) -> Result<ClipBlob, CaptureError> {
        ClipBlob::from_bytes(b"finished-take").map_err(|e| CaptureError::Encoder(e.to_string()))
    }

    fn abort(&mut self) {}
}

struct MemorySink {
    records: Mutex<Vec<SubmissionRecord>>,
}

#[async_trait]
impl SubmissionSink for MemorySink {
    async fn submit(&self, record: &SubmissionRecord) -> Result<(), SubmitError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

fn pro_config(question: &str) -> CaptureConfig {
    let caps = GuestCapabilities::from_tier(PlanTier::Pro);
    CaptureConfig::response(&caps, PromptSchedule::new(question))
}

#[tokio::test]
async fn guest_records_reviews_and_submits() {
    let releases = Arc::new(AtomicUsize::new(0));
    let device = FakeDevice {
        releases: releases.clone(),
    };
    let stream = device
        .acquire(MediaConstraints::video_and_audio())
        .await
        .unwrap();

    let mut session = CaptureSession::new(
        stream,
        Box::new(FakeEncoder { seq: 0 }),
        pro_config("What is your favorite memory?"),
    );

    session.begin().unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }
    assert_eq!(session.phase(), CapturePhase::Recording);

    // Record 20 seconds; the prompt flips at 15
    for second in 1..=20u32 {
        match session.tick().unwrap() {
            Tick::Recording { elapsed_seconds } => assert_eq!(elapsed_seconds, second),
            other => panic!("unexpected tick outcome: {other:?}"),
        }
        let expected_index = usize::from(second >= 15);
        assert_eq!(session.prompt_index(), expected_index);
    }

    let completed = session.stop().unwrap();
    assert_eq!(completed.duration_seconds, 20);
    assert!(completed.duration_seconds <= 120);
    assert!(completed.fragment_count >= 20);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    // Review and submit
    let mut review = ReviewSession::new("event-42", completed);
    assert!(review.playable_ref().is_ok());

    let sink = MemorySink {
        records: Mutex::new(Vec::new()),
    };
    let guest = GuestInfo {
        name: "Maya".to_string(),
        relationship: "Sister".to_string(),
    };
    let record = review.submit(&sink, &guest).await.unwrap();
    assert_eq!(record.guest_name, "Maya");
    assert_eq!(record.duration_seconds, 20);
    assert_eq!(sink.records.lock().len(), 1);
}

#[tokio::test]
async fn cancel_mid_countdown_leaves_no_trace() {
    let releases = Arc::new(AtomicUsize::new(0));
    let device = FakeDevice {
        releases: releases.clone(),
    };
    let stream = device
        .acquire(MediaConstraints::video_and_audio())
        .await
        .unwrap();

    let mut session =
        CaptureSession::new(stream, Box::new(FakeEncoder { seq: 0 }), pro_config("q"));
    session.begin().unwrap();
    session.tick().unwrap();
    session.cancel();

    assert_eq!(session.phase(), CapturePhase::Stopped);
    assert_eq!(session.fragment_count(), 0);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retake_builds_a_fresh_session_and_releases_the_old_clip() {
    let releases = Arc::new(AtomicUsize::new(0));
    let device = FakeDevice {
        releases: releases.clone(),
    };

    // First take
    let stream = device
        .acquire(MediaConstraints::video_and_audio())
        .await
        .unwrap();
    let mut session =
        CaptureSession::new(stream, Box::new(FakeEncoder { seq: 0 }), pro_config("q"));
    session.begin().unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }
    session.tick().unwrap();
    let first = session.stop().unwrap();
    let first_path = std::path::PathBuf::from(first.clip.playable_ref().unwrap());

    // Guest rejects it
    ReviewSession::new("event-42", first).retake();
    assert!(!first_path.exists(), "retake must revoke the old blob");
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    // Second take with a brand-new acquisition
    let stream = device
        .acquire(MediaConstraints::video_and_audio())
        .await
        .unwrap();
    let mut session =
        CaptureSession::new(stream, Box::new(FakeEncoder { seq: 0 }), pro_config("q"));
    session.begin().unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }
    session.tick().unwrap();
    session.tick().unwrap();
    let second = session.stop().unwrap();
    assert_eq!(second.duration_seconds, 2);
    assert_eq!(releases.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn free_plan_caps_recording_at_sixty_seconds() {
    let device = FakeDevice {
        releases: Arc::new(AtomicUsize::new(0)),
    };
    let stream = device
        .acquire(MediaConstraints::video_and_audio())
        .await
        .unwrap();

    let caps = GuestCapabilities::from_tier(PlanTier::Free);
    let config = CaptureConfig::response(&caps, PromptSchedule::new("q"));
    let mut session = CaptureSession::new(stream, Box::new(FakeEncoder { seq: 0 }), config);

    session.begin().unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }

    let mut stopped_at = None;
    for _ in 0..120 {
        match session.tick() {
            Ok(Tick::AutoStopped(clip)) => {
                stopped_at = Some(clip.duration_seconds);
                break;
            }
            Ok(_) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(stopped_at, Some(60));
}
