//! Chart entries
//!
//! A chart entry is created once when the chart is loaded and never mutated
//! afterwards. The chart store hands entries out behind `Arc`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of fun facts kept per entry
pub const MAX_FUN_FACTS: usize = 3;

/// Stable chart entry identifier (the seed database row id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartEntryId(pub i64);

impl fmt::Display for ChartEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a song in one chart edition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub year: i32,
    pub position: u32,
}

impl PositionRecord {
    pub fn new(year: i32, position: u32) -> Self {
        Self { year, position }
    }
}

/// Canonical chart song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub id: ChartEntryId,
    /// Position in the edition currently being broadcast (1-2000)
    pub position: u32,
    pub artist: String,
    pub title: String,
    /// Release year, when known
    pub year: Option<i32>,
    /// Up to three fun facts, in display order
    pub fun_facts: Vec<String>,
    /// Chronological, one record per year
    pub position_history: Vec<PositionRecord>,
}

impl ChartEntry {
    pub fn new(
        id: i64,
        position: u32,
        artist: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: ChartEntryId(id),
            position,
            artist: artist.into(),
            title: title.into(),
            year: None,
            fun_facts: Vec::new(),
            position_history: Vec::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set fun facts, keeping at most [`MAX_FUN_FACTS`]
    pub fn with_fun_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fun_facts = facts
            .into_iter()
            .map(Into::<String>::into)
            .filter(|f| !f.trim().is_empty())
            .take(MAX_FUN_FACTS)
            .collect();
        self
    }

    /// Set position history from `(year, position)` pairs in any order
    ///
    /// Records are sorted by year; when a year appears twice the first
    /// occurrence wins.
    pub fn with_history<I>(mut self, history: I) -> Self
    where
        I: IntoIterator<Item = (i32, u32)>,
    {
        let mut records: Vec<PositionRecord> = Vec::new();
        for (year, position) in history {
            if !records.iter().any(|r| r.year == year) {
                records.push(PositionRecord::new(year, position));
            }
        }
        records.sort_by_key(|r| r.year);
        self.position_history = records;
        self
    }

    /// Position recorded for `year`, if any
    pub fn position_in(&self, year: i32) -> Option<u32> {
        self.position_history
            .iter()
            .find(|r| r.year == year)
            .map(|r| r.position)
    }

    /// Newest history record strictly before `year`
    pub fn latest_before(&self, year: i32) -> Option<PositionRecord> {
        self.position_history
            .iter()
            .rev()
            .find(|r| r.year < year)
            .copied()
    }

    /// Newest history record overall
    pub fn most_recent(&self) -> Option<PositionRecord> {
        self.position_history.last().copied()
    }
}
