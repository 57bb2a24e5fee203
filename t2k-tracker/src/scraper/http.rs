//! Shared HTTP plumbing for the scraper tiers

use crate::error::TrackerResult;
use crate::models::{RawAiring, SourceTier};
use serde::Deserialize;
use std::time::Duration;

/// Station pages serve reduced markup to unknown clients
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the client shared by all tiers
///
/// The per-tier timeout is enforced by the scraper; the client timeout is a
/// backstop for requests made outside it.
pub fn build_client(timeout: Duration) -> TrackerResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;
    Ok(client)
}

/// GET `url` and return the body, mapping transport and status failures to text
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| format!("read body failed: {}", e))
}

/// Trimmed field value; blank and literal "Unknown" count as missing
pub fn clean_field(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Split `"Artist - Title"` on the first separator
pub fn split_artist_title(text: &str) -> Option<(String, String)> {
    let (artist, title) = text.split_once(" - ")?;
    Some((clean_field(Some(artist))?, clean_field(Some(title))?))
}

/// Track play as published by the station's site
#[derive(Debug, Default, Deserialize)]
pub struct TrackPlay {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    /// Usually a URL string; other shapes are ignored
    #[serde(default)]
    pub image: Option<serde_json::Value>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

impl TrackPlay {
    /// Airing for this play, or `None` when artist or title is missing
    pub fn into_airing(self, tier: SourceTier) -> Option<RawAiring> {
        let artist = clean_field(self.artist.as_deref())?;
        let title = clean_field(self.name.as_deref())
            .or_else(|| clean_field(self.title.as_deref()))
            .or_else(|| clean_field(self.song.as_deref()))?;
        let image = self
            .image
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or(self.image_url);
        Some(RawAiring::new(artist, title, tier).with_image_url(image))
    }
}
