//! Resolved songs and the published coordinator state

use super::{ChartEntry, PositionRecord, SourceTier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Direction of a year-over-year chart move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Same,
    /// No prior-year record to compare with
    Unknown,
}

/// Signed change in chart position
///
/// `delta = previous_position - current_position`; positive means the song
/// climbed (numerically lower position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub delta: i32,
    pub direction: TrendDirection,
}

impl Trend {
    pub fn unknown() -> Self {
        Self {
            delta: 0,
            direction: TrendDirection::Unknown,
        }
    }

    pub fn from_delta(delta: i32) -> Self {
        let direction = match delta {
            d if d > 0 => TrendDirection::Up,
            d if d < 0 => TrendDirection::Down,
            _ => TrendDirection::Same,
        };
        Self { delta, direction }
    }

    /// Short display label such as `"↑ 3"`; `None` when unknown
    pub fn label(&self) -> Option<String> {
        match self.direction {
            TrendDirection::Up => Some(format!("↑ {}", self.delta)),
            TrendDirection::Down => Some(format!("↓ {}", self.delta.abs())),
            TrendDirection::Same => Some("→ 0".to_string()),
            TrendDirection::Unknown => None,
        }
    }
}

/// A chart entry matched to the broadcast, with derived attributes
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSong {
    pub entry: Arc<ChartEntry>,
    /// Match confidence in [0, 1]; 1.0 for entries derived from the chart itself
    pub match_confidence: f64,
    pub cover_art_url: Option<String>,
    pub trend: Trend,
    pub trend_label: Option<String>,
    /// Prior editions, newest first
    pub history: Vec<PositionRecord>,
    /// Times this entry has become current in this session (0 while only upcoming)
    pub occurrence_epoch: u32,
    /// Tier that observed the airing; `None` for predicted upcoming songs
    pub source_tier: Option<SourceTier>,
}

/// Per-tier scraper counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierDiagnostics {
    pub tier: Option<SourceTier>,
    pub successes: u64,
    pub empties: u64,
    pub failures: u64,
}

/// Observability counters, republished by every poll
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub polls: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Polls in a row where every tier failed
    pub consecutive_failures: u32,
    pub total_failures: u64,
    /// Polls in a row whose airing matched nothing
    pub consecutive_unresolved: u32,
    /// Tier that produced the most recent airing
    pub last_tier: Option<SourceTier>,
    pub tiers: Vec<TierDiagnostics>,
    pub notifications_sent: u64,
}

/// Snapshot published by the coordinator
///
/// Built completely before it is swapped in; readers only ever see whole
/// snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorState {
    pub current: Option<ResolvedSong>,
    pub upcoming: Vec<ResolvedSong>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub diagnostics: Diagnostics,
}

impl CoordinatorState {
    /// Id of the current entry, if one is resolved
    pub fn current_entry_id(&self) -> Option<super::ChartEntryId> {
        self.current.as_ref().map(|song| song.entry.id)
    }
}
