//! # signcast Common Library
//!
//! Shared code for the signcast device agent:
//! - Catalog domain model and lenient upstream parsing
//! - Event types (PlayerEvent enum)
//! - Database bootstrap and settings helpers
//! - Data folder resolution
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{MediaAsset, MediaKind, SubAsset, UrlType};
