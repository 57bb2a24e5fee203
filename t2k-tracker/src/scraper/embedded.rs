//! Tier 2: JSON embedded in the station homepage
//!
//! The page is a Next.js app; the newest track play lives at
//! `props.pageProps.trackPlaysList.tracksPlays[0]` inside the
//! `<script id="__NEXT_DATA__">` element.

use super::http::{get_text, TrackPlay};
use super::{AiringSource, TierOutcome};
use crate::error::{TrackerError, TrackerResult};
use crate::models::SourceTier;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

const NEXT_DATA_PATTERN: &str = r#"(?s)<script[^>]*id=["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#;
const PLAY_POINTER: &str = "/props/pageProps/trackPlaysList/tracksPlays/0";

pub struct EmbeddedDataSource {
    client: reqwest::Client,
    url: String,
    next_data: Regex,
}

impl EmbeddedDataSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> TrackerResult<Self> {
        let next_data = Regex::new(NEXT_DATA_PATTERN)
            .map_err(|e| TrackerError::ConfigurationInvalid(format!("next-data pattern: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            next_data,
        })
    }

    /// Extract the newest track play from page HTML
    ///
    /// `Err` when the page has no parseable `__NEXT_DATA__`; `Ok(None)` when the
    /// data is present but lists no play.
    pub fn parse_page(&self, html: &str) -> Result<Option<TrackPlay>, String> {
        let raw = self
            .next_data
            .captures(html)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| "no __NEXT_DATA__ script".to_string())?;

        let data: Value = serde_json::from_str(raw.as_str().trim())
            .map_err(|e| format!("malformed __NEXT_DATA__: {}", e))?;

        Ok(data
            .pointer(PLAY_POINTER)
            .and_then(|play| serde_json::from_value(play.clone()).ok()))
    }
}

#[async_trait]
impl AiringSource for EmbeddedDataSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Embedded
    }

    fn signature(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> TierOutcome {
        let html = match get_text(&self.client, &self.url).await {
            Ok(html) => html,
            Err(e) => return TierOutcome::Error(e),
        };

        match self.parse_page(&html) {
            Ok(Some(play)) => match play.into_airing(SourceTier::Embedded) {
                Some(airing) => TierOutcome::Success(airing),
                None => TierOutcome::Empty,
            },
            Ok(None) => TierOutcome::Empty,
            Err(e) => TierOutcome::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> EmbeddedDataSource {
        EmbeddedDataSource::new(reqwest::Client::new(), "http://localhost/").unwrap()
    }

    #[test]
    fn test_parse_next_data() {
        let html = r#"<html><body><div id="__next"></div>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"trackPlaysList":{"tracksPlays":[
                {"artist":"Golden Earring","name":"Radar Love","imageUrl":"https://img/radar.jpg"}
            ]}}}}
            </script></body></html>"#;

        let play = source().parse_page(html).unwrap().unwrap();
        let airing = play.into_airing(SourceTier::Embedded).unwrap();
        assert_eq!(airing.artist_text, "Golden Earring");
        assert_eq!(airing.title_text, "Radar Love");
        assert_eq!(airing.image_url.as_deref(), Some("https://img/radar.jpg"));
    }

    #[test]
    fn test_missing_script_is_error() {
        assert!(source().parse_page("<html></html>").is_err());
    }

    #[test]
    fn test_empty_play_list_is_none() {
        let html = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"trackPlaysList":{"tracksPlays":[]}}}}</script>"#;
        assert!(source().parse_page(html).unwrap().is_none());
    }
}
