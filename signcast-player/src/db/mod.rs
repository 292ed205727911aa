//! Database access for the player

pub mod catalog;
pub mod settings;
