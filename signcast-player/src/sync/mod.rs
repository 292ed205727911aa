//! Catalog synchronization
//!
//! `orchestrator` serializes catalog mutations behind a command queue;
//! `cache` answers what is actually usable on disk.

pub mod cache;
pub mod orchestrator;
