//! MusicBrainz + Cover Art Archive lookup
//!
//! 1. Search MusicBrainz releases for `artist:"A" AND recording:"T"` (limit 5)
//! 2. For up to three releases, fetch the Cover Art Archive image list
//! 3. Prefer the front image's 500px thumbnail, then `large`, then the full
//!    image; fall back to the first image when no front is flagged
//!
//! A 404 from the archive means the release has no artwork and the next one
//! is tried. MusicBrainz requests are limited to one per second.

use super::CoverArtLookup;
use crate::error::{TrackerError, TrackerResult};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const SEARCH_LIMIT: u32 = 5;
const RELEASES_TRIED: usize = 3;

#[derive(Debug, Deserialize)]
struct ReleaseSearch {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ImageList {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    #[serde(default)]
    front: bool,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

impl Image {
    fn best_url(&self) -> Option<String> {
        self.thumbnails
            .get("500")
            .or_else(|| self.thumbnails.get("large"))
            .cloned()
            .or_else(|| self.image.clone())
    }
}

/// Pick the artwork URL from a Cover Art Archive image list
fn choose_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .find(|image| image.front)
        .or_else(|| images.first())
        .and_then(Image::best_url)
}

/// MusicBrainz/Cover Art Archive client
pub struct MusicBrainzCoverArt {
    client: Client,
    musicbrainz_url: String,
    cover_art_archive_url: String,
    user_agent: String,
    /// Rate limiter: 1 request per second (MusicBrainz policy)
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl MusicBrainzCoverArt {
    /// # Arguments
    /// * `musicbrainz_url` - web service root, e.g. `https://musicbrainz.org/ws/2`
    /// * `cover_art_archive_url` - archive root, e.g. `https://coverartarchive.org`
    /// * `user_agent` - identifying User-Agent (required by MusicBrainz)
    pub fn new(
        musicbrainz_url: impl Into<String>,
        cover_art_archive_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> TrackerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            musicbrainz_url: musicbrainz_url.into().trim_end_matches('/').to_string(),
            cover_art_archive_url: cover_art_archive_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            rate_limiter: RateLimiter::direct(Quota::per_second(NonZeroU32::MIN)),
        })
    }

    async fn search_releases(&self, artist: &str, title: &str) -> TrackerResult<Vec<Release>> {
        self.rate_limiter.until_ready().await;

        let query = format!(
            "artist:\"{}\" AND recording:\"{}\"",
            escape_query(artist),
            escape_query(title)
        );
        let limit = SEARCH_LIMIT.to_string();
        debug!(query = %query, "Searching MusicBrainz releases");

        let response = self
            .client
            .get(format!("{}/release", self.musicbrainz_url))
            .query(&[
                ("query", query.as_str()),
                ("limit", limit.as_str()),
                ("fmt", "json"),
            ])
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(TrackerError::EnrichmentFailure(
                "MusicBrainz rate limit exceeded".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TrackerError::EnrichmentFailure(format!(
                "MusicBrainz search returned {}",
                status
            )));
        }

        let search: ReleaseSearch = response.json().await?;
        Ok(search.releases)
    }

    /// Artwork for one release; `Ok(None)` when the archive has none
    async fn release_art(&self, release_id: &str) -> TrackerResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/release/{}", self.cover_art_archive_url, release_id))
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(release_id = %release_id, "No cover art for release");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TrackerError::EnrichmentFailure(format!(
                "Cover Art Archive returned {} for release {}",
                status, release_id
            )));
        }

        let list: ImageList = response.json().await?;
        Ok(choose_image(&list.images))
    }
}

/// Escape Lucene special characters used inside a quoted phrase
fn escape_query(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl CoverArtLookup for MusicBrainzCoverArt {
    async fn lookup(&self, artist: &str, title: &str) -> TrackerResult<Option<String>> {
        let releases = self.search_releases(artist, title).await?;
        if releases.is_empty() {
            debug!(artist = %artist, title = %title, "No MusicBrainz releases");
            return Ok(None);
        }

        let tried: Vec<&Release> = releases.iter().take(RELEASES_TRIED).collect();
        let mut errors = Vec::new();
        for release in &tried {
            match self.release_art(&release.id).await {
                Ok(Some(url)) => return Ok(Some(url)),
                Ok(None) => {}
                Err(e) => {
                    debug!(release_id = %release.id, error = %e, "Cover art fetch failed");
                    errors.push(e);
                }
            }
        }

        // Only an archive that failed for every release counts as a failure
        if errors.len() == tried.len() {
            if let Some(e) = errors.pop() {
                return Err(e);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(front: bool, thumbs: &[(&str, &str)], full: Option<&str>) -> Image {
        Image {
            front,
            image: full.map(str::to_string),
            thumbnails: thumbs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_front_500_preferred() {
        let images = vec![
            image(false, &[("500", "back-500")], None),
            image(true, &[("large", "front-large"), ("500", "front-500")], Some("front")),
        ];
        assert_eq!(choose_image(&images).as_deref(), Some("front-500"));
    }

    #[test]
    fn test_large_then_full_image() {
        let images = vec![image(true, &[("large", "front-large")], Some("front"))];
        assert_eq!(choose_image(&images).as_deref(), Some("front-large"));

        let images = vec![image(true, &[], Some("front"))];
        assert_eq!(choose_image(&images).as_deref(), Some("front"));
    }

    #[test]
    fn test_first_image_without_front() {
        let images = vec![image(false, &[("500", "first-500")], None), image(false, &[], Some("x"))];
        assert_eq!(choose_image(&images).as_deref(), Some("first-500"));
        assert_eq!(choose_image(&[]), None);
    }

    #[test]
    fn test_query_escaping() {
        assert_eq!(escape_query(r#"12" Single"#), r#"12\" Single"#);
    }
}
