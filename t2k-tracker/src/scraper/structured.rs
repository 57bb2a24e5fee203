//! Tier 1: structured "now playing" endpoint
//!
//! The endpoint returns JSON with the newest track play first. Known layouts
//! nest the plays under `data.radio_track_plays.data`, `data` or
//! `tracksPlays`; the first layout present wins.

use super::http::{get_text, TrackPlay};
use super::{AiringSource, TierOutcome};
use crate::models::SourceTier;
use async_trait::async_trait;
use serde_json::Value;

const PLAY_POINTERS: [&str; 3] = [
    "/data/radio_track_plays/data/0",
    "/data/0",
    "/tracksPlays/0",
];

pub struct StructuredSource {
    client: reqwest::Client,
    url: String,
}

impl StructuredSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// Newest track play in a now-playing payload
pub fn parse_now_playing(payload: &Value) -> Option<TrackPlay> {
    PLAY_POINTERS
        .iter()
        .find_map(|pointer| payload.pointer(pointer))
        .and_then(|play| serde_json::from_value(play.clone()).ok())
}

#[async_trait]
impl AiringSource for StructuredSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Structured
    }

    fn signature(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> TierOutcome {
        let body = match get_text(&self.client, &self.url).await {
            Ok(body) => body,
            Err(e) => return TierOutcome::Error(e),
        };

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(e) => return TierOutcome::Error(format!("malformed JSON: {}", e)),
        };

        match parse_now_playing(&payload).and_then(|play| play.into_airing(SourceTier::Structured)) {
            Some(airing) => TierOutcome::Success(airing),
            None => TierOutcome::Empty,
        }
    }
}
