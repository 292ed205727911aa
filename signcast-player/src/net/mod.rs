//! Upstream networking
//!
//! Registration socket, REST catalog fetch, validated downloads, and the
//! reachability probe they all gate on.

pub mod catalog;
pub mod connectivity;
pub mod download;
pub mod protocol;
pub mod registration;
