//! Event types for the signcast event system
//!
//! Events flow from the sync engine and the playback scheduler over a
//! broadcast channel, out to the rendering surface via SSE.

use crate::model::{MediaKind, UrlType};
use serde::{Deserialize, Serialize};

/// One pane of a play directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneSourceInfo {
    /// 0 = left (or full-screen for SINGLE), 1 = right
    pub pane: usize,
    pub source_type: UrlType,
    /// Effective source: verified local file when available, else remote URL
    pub uri: String,
    /// Always the remote URL; the pane retry path replays from here
    pub remote_url: String,
    /// True when `uri` points at the local cache
    pub local: bool,
}

/// Play directive payload for `NowPlaying`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub asset_id: String,
    pub title: String,
    pub kind: MediaKind,
    pub duration_seconds: i64,
    pub panes: Vec<PaneSourceInfo>,
}

/// Registration transport lifecycle, surfaced over SSE for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPhase {
    Connecting,
    Registered,
    Failed,
    Offline,
}

impl std::fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationPhase::Connecting => write!(f, "connecting"),
            RegistrationPhase::Registered => write!(f, "registered"),
            RegistrationPhase::Failed => write!(f, "failed"),
            RegistrationPhase::Offline => write!(f, "offline"),
        }
    }
}

/// signcast event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A new catalog generation was persisted
    CatalogUpdated {
        asset_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The scheduler wants the surface to play this asset
    NowPlaying {
        asset: NowPlayingInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One-shot pane retry: replay a single pane from its remote URL
    PaneRetry {
        asset_id: String,
        pane: usize,
        uri: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upstream blocked/unblocked the device
    BlockedChanged {
        blocked: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Nothing playable remains after all fallbacks
    PlaybackExhausted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A sync pass failed end to end; the previous catalog stays in effect
    SyncFailed {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Registration transport state change
    RegistrationState {
        phase: RegistrationPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A verification sweep finished
    VerifyCompleted {
        cleared: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            PlayerEvent::CatalogUpdated { .. } => "CatalogUpdated",
            PlayerEvent::NowPlaying { .. } => "NowPlaying",
            PlayerEvent::PaneRetry { .. } => "PaneRetry",
            PlayerEvent::BlockedChanged { .. } => "BlockedChanged",
            PlayerEvent::PlaybackExhausted { .. } => "PlaybackExhausted",
            PlayerEvent::SyncFailed { .. } => "SyncFailed",
            PlayerEvent::RegistrationState { .. } => "RegistrationState",
            PlayerEvent::VerifyCompleted { .. } => "VerifyCompleted",
        }
    }
}
