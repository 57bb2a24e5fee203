//! Raw "now playing" observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scraper tier that produced an observation, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    /// Structured JSON endpoint
    Structured,
    /// JSON embedded in the station page
    Embedded,
    /// Heuristic scrape of a playlist page
    Html,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Structured => "structured",
            SourceTier::Embedded => "embedded",
            SourceTier::Html => "html",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text airing as reported upstream
///
/// Produced by one scraper tier per poll and consumed immediately by the
/// matcher. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAiring {
    pub artist_text: String,
    pub title_text: String,
    pub observed_at: DateTime<Utc>,
    pub source_tier: SourceTier,
    /// Artwork supplied by the upstream source, if any
    pub image_url: Option<String>,
}

impl RawAiring {
    pub fn new(
        artist_text: impl Into<String>,
        title_text: impl Into<String>,
        source_tier: SourceTier,
    ) -> Self {
        Self {
            artist_text: artist_text.into(),
            title_text: title_text.into(),
            observed_at: Utc::now(),
            source_tier,
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|url| !url.trim().is_empty());
        self
    }
}
