//! Error types for signcast-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Most runtime failures are handled inside the component that
//! saw them (bounded retries, degraded fallbacks); these types cover the
//! paths that do propagate.

use thiserror::Error;

/// Main error type for the signcast-player module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors propagated from the shared signcast-common crate
    #[error(transparent)]
    Common(#[from] signcast_common::Error),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Upstream fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Registration socket errors
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Media probe errors
    #[error("Probe error: {0}")]
    Probe(String),

    /// Catalog sync errors
    #[error("Sync error: {0}")]
    Sync(String),

    /// Playback scheduling errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using signcast-player Error
pub type Result<T> = std::result::Result<T, Error>;
