//! Review and submission
//!
//! The play / retake / submit step between a sealed recording and the
//! persistence collaborator. A failed upload keeps the clip in memory so
//! the guest can retry without re-recording; a successful submit emits
//! exactly one record.

use crate::capture::session::CompletedClip;
use crate::clip::ClipError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Submission errors
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The sink rejected the record or was unreachable; retry allowed
    #[error("Upload failed: {0}")]
    UploadFailure(String),

    #[error("This recording was already submitted")]
    AlreadySubmitted,

    #[error("Clip no longer available: {0}")]
    ClipUnavailable(String),
}

/// Who recorded the clip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    pub name: String,
    pub relationship: String,
}

impl Default for GuestInfo {
    fn default() -> Self {
        Self {
            name: "Anonymous".to_string(),
            relationship: "Guest".to_string(),
        }
    }
}

/// Submission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Completed,
}

/// One completed guest submission, as handed to the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub event_id: String,
    pub guest_name: String,
    pub relationship: String,
    pub video_ref: String,
    pub duration_seconds: u32,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator for completed submissions
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Persist one record; failure must leave no partial/ghost record
    async fn submit(&self, record: &SubmissionRecord) -> Result<(), SubmitError>;
}

/// Holds a sealed recording through play / retake / submit
pub struct ReviewSession {
    event_id: String,
    clip: CompletedClip,
    submitted: bool,
}

impl ReviewSession {
    pub fn new(event_id: impl Into<String>, clip: CompletedClip) -> Self {
        Self {
            event_id: event_id.into(),
            clip,
            submitted: false,
        }
    }

    /// The clip under review
    pub fn clip(&self) -> &CompletedClip {
        &self.clip
    }

    /// Playable locator for the preview player
    pub fn playable_ref(&self) -> Result<String, ClipError> {
        self.clip.clip.playable_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Submit the clip to the persistence collaborator
    ///
    /// On failure the session is unchanged and the same clip can be
    /// resubmitted; on success the record was emitted exactly once.
    pub async fn submit(
        &mut self,
        sink: &dyn SubmissionSink,
        guest: &GuestInfo,
    ) -> Result<SubmissionRecord, SubmitError> {
        if self.submitted {
            return Err(SubmitError::AlreadySubmitted);
        }
        let video_ref = self
            .clip
            .clip
            .playable_ref()
            .map_err(|e| SubmitError::ClipUnavailable(e.to_string()))?;

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            event_id: self.event_id.clone(),
            guest_name: guest.name.clone(),
            relationship: guest.relationship.clone(),
            video_ref,
            duration_seconds: self.clip.duration_seconds,
            status: SubmissionStatus::Completed,
            created_at: Utc::now(),
        };

        sink.submit(&record).await?;
        self.submitted = true;
        tracing::info!(
            "Submission {} persisted for event {}",
            record.id,
            record.event_id
        );
        Ok(record)
    }

    /// Discard the recording and release its blob; the caller starts a
    /// fresh capture session for the retake
    pub fn retake(mut self) {
        tracing::info!("Retake requested; discarding reviewed clip");
        self.clip.clip.revoke();
    }
}
