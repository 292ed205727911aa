//! Playback types shared across modules

use serde::{Deserialize, Serialize};

/// Scheduler lifecycle phase
///
/// `Exhausted` means the cached catalog came back empty (or nothing in it
/// was playable); the rendering surface stops until a catalog update
/// restarts the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    Idle,
    Loading,
    Playing,
    Exhausted,
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerPhase::Idle => write!(f, "idle"),
            SchedulerPhase::Loading => write!(f, "loading"),
            SchedulerPhase::Playing => write!(f, "playing"),
            SchedulerPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}
