//! Playback scheduling
//!
//! The scheduler walks the cached catalog and drives the rendering surface
//! through events; `types` holds the phase and outcome enums shared with
//! the control API.

pub mod scheduler;
pub mod types;
