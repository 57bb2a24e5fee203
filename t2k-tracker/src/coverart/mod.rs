//! Cover art resolver
//!
//! Looks up artwork for chart entries through a [`CoverArtLookup`] and caches
//! the answer, including "not found", for the cover art TTL. Lookup failures
//! are not cached so the next song change retries them.

pub mod musicbrainz;

pub use musicbrainz::MusicBrainzCoverArt;

use crate::cache::TtlCache;
use crate::error::TrackerResult;
use crate::matcher::normalize;
use crate::models::ChartEntry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Artwork catalog lookup by artist and title
#[async_trait]
pub trait CoverArtLookup: Send + Sync {
    /// `Ok(None)` when the catalog has no artwork for the song
    async fn lookup(&self, artist: &str, title: &str) -> TrackerResult<Option<String>>;
}

pub struct CoverArtResolver {
    lookup: Arc<dyn CoverArtLookup>,
    cache: TtlCache<String, Option<String>>,
}

impl CoverArtResolver {
    pub fn new(lookup: Arc<dyn CoverArtLookup>, ttl: Duration) -> Self {
        Self {
            lookup,
            cache: TtlCache::new(ttl),
        }
    }

    fn cache_key(entry: &ChartEntry) -> String {
        format!("{}|{}", normalize(&entry.artist), normalize(&entry.title))
    }

    /// Artwork URL for `entry`; `None` when not found or the lookup failed
    pub async fn resolve(&self, entry: &ChartEntry) -> Option<String> {
        let key = Self::cache_key(entry);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(entry_id = %entry.id, found = cached.is_some(), "Cover art cache hit");
            return cached;
        }

        match self.lookup.lookup(&entry.artist, &entry.title).await {
            Ok(url) => {
                debug!(entry_id = %entry.id, found = url.is_some(), "Cover art looked up");
                self.cache.insert(key, url.clone()).await;
                url
            }
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "Cover art lookup failed");
                None
            }
        }
    }

    /// Record artwork supplied by the upstream source for `entry`
    pub async fn remember(&self, entry: &ChartEntry, url: &str) {
        self.cache
            .insert(Self::cache_key(entry), Some(url.to_string()))
            .await;
    }
}
