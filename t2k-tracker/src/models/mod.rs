//! Data models for the tracker pipeline
//!
//! - `chart`: immutable chart entries and their position history
//! - `airing`: raw "now playing" observations produced by the scraper
//! - `resolved`: matched songs, trends and the published coordinator state
//! - `notification`: rules, settings, dedupe keys and outbound messages

pub mod airing;
pub mod chart;
pub mod notification;
pub mod resolved;

pub use airing::{RawAiring, SourceTier};
pub use chart::{ChartEntry, ChartEntryId, PositionRecord};
pub use notification::{
    DedupeKey, NotificationRule, NotificationSettings, NotificationTarget, OutboundMessage,
    RuleId, RuleKind,
};
pub use resolved::{
    CoordinatorState, Diagnostics, ResolvedSong, TierDiagnostics, Trend, TrendDirection,
};
