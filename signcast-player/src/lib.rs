//! # signcast Player Library (signcast-player)
//!
//! Unattended signage playback agent.
//!
//! **Purpose:** Register with the upstream catalog service, download and
//! verify media into a local cache, persist the catalog in SQLite, and
//! drive the rendering surface through an endless playback loop over a
//! local HTTP/SSE control interface.
//!
//! **Architecture:** registration socket + REST fallback feed a serialized
//! sync queue; the playback scheduler walks the cached catalog and the
//! rendering surface reports pane outcomes back over the control API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod net;
pub mod playback;
pub mod probe;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
pub use state::SharedState;
