//! # Top 2000 Tracker Common Library
//!
//! Shared code for the tracker crates:
//! - Error and result types
//! - TOML bootstrap configuration and root folder resolution
//! - Event types (TrackerEvent enum) and the broadcast EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
