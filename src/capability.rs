//! Plan tiers and the guest capability gate
//!
//! The organizer's plan decides how long guests may record and which
//! affordances an event gets. Sessions receive a read-only
//! [`GuestCapabilities`] snapshot at construction instead of reading
//! ambient plan state mid-flow.

use serde::{Deserialize, Serialize};

/// Subscription tier an event was created under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Premium,
}

/// Limits attached to a plan tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    /// Maximum number of guest submissions (None = unlimited)
    pub max_guests: Option<u32>,

    /// Maximum recording duration per guest, in seconds
    pub recording_duration_seconds: u32,

    /// Whether the organizer may attach a video intro
    pub has_intro_video: bool,

    /// Whether compiled output may be downloaded
    pub has_downloads: bool,

    /// Whether the merge/compilation step is available
    pub has_merge_access: bool,

    /// Whether the watermark can be replaced with custom branding
    pub has_custom_branding: bool,
}

impl PlanTier {
    /// Limits table for this tier
    pub fn limits(&self) -> PlanLimits {
        match self {
            PlanTier::Free => PlanLimits {
                max_guests: Some(10),
                recording_duration_seconds: 60,
                has_intro_video: false,
                has_downloads: false,
                has_merge_access: false,
                has_custom_branding: false,
            },
            PlanTier::Pro => PlanLimits {
                max_guests: Some(50),
                recording_duration_seconds: 120,
                has_intro_video: true,
                has_downloads: true,
                has_merge_access: false,
                has_custom_branding: false,
            },
            PlanTier::Premium => PlanLimits {
                max_guests: None,
                recording_duration_seconds: 300,
                has_intro_video: true,
                has_downloads: true,
                has_merge_access: true,
                has_custom_branding: true,
            },
        }
    }
}

/// Read-only capability snapshot handed to capture and compilation flows
///
/// Derived from the event's plan snapshot once, then injected; nothing in
/// the pipelines reads plan state after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCapabilities {
    /// Hard wall-clock cap for one recording, in seconds
    pub max_duration_seconds: u32,

    /// Whether intro-kind captures are permitted
    pub allow_video_intro: bool,
}

impl GuestCapabilities {
    /// Build capabilities from a plan limits snapshot
    pub fn from_limits(limits: &PlanLimits) -> Self {
        Self {
            max_duration_seconds: limits.recording_duration_seconds,
            allow_video_intro: limits.has_intro_video,
        }
    }

    /// Build capabilities straight from a tier
    pub fn from_tier(tier: PlanTier) -> Self {
        Self::from_limits(&tier.limits())
    }

    /// Clamp a requested duration to the plan ceiling
    ///
    /// A zero request still yields a 1-second floor so a session can never
    /// be configured to record nothing.
    pub fn clamp_duration(&self, requested_seconds: u32) -> u32 {
        requested_seconds.clamp(1, self.max_duration_seconds.max(1))
    }
}
