//! Metadata scraper
//!
//! Fetches the currently airing song through an ordered list of tiers:
//!
//! 1. **structured** - JSON "now playing" endpoint
//! 2. **embedded** - `__NEXT_DATA__` JSON embedded in the station page
//! 3. **html** - heuristic scrape of a third-party playlist page
//!
//! Tiers run sequentially, each under its own timeout, and the first
//! `Success` short-circuits the rest. A successful observation is cached for
//! the metadata TTL so polls inside the window make no network calls.

pub mod embedded;
pub mod html;
pub mod http;
pub mod structured;

pub use embedded::EmbeddedDataSource;
pub use html::PlaylistPageSource;
pub use structured::StructuredSource;

use crate::cache::TtlCache;
use crate::models::{RawAiring, SourceTier, TierDiagnostics};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Result of one tier attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Success(RawAiring),
    /// Reachable, but nothing is airing or the payload had no usable song
    Empty,
    /// Transport, status or parse failure
    Error(String),
}

/// One strategy for reading the currently airing song
#[async_trait]
pub trait AiringSource: Send + Sync {
    fn tier(&self) -> SourceTier;

    /// Identity of the upstream request, used for the cache key
    fn signature(&self) -> String;

    async fn fetch(&self) -> TierOutcome;
}

/// Result of a scraper fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Airing { airing: RawAiring, cached: bool },
    /// Every tier failed or was empty
    Unavailable { failures: Vec<String> },
}

#[derive(Default)]
struct TierCounters {
    successes: AtomicU64,
    empties: AtomicU64,
    failures: AtomicU64,
}

/// Tiered "now playing" fetcher with a short-lived cache
pub struct MetadataScraper {
    tiers: Vec<Arc<dyn AiringSource>>,
    counters: Vec<TierCounters>,
    tier_timeout: Duration,
    cache: TtlCache<String, RawAiring>,
    cache_key: String,
    last_tier: RwLock<Option<SourceTier>>,
}

impl MetadataScraper {
    /// # Arguments
    /// * `tiers` - strategies in priority order
    /// * `tier_timeout` - budget for each tier attempt
    /// * `cache_ttl` - lifetime of a successful observation
    pub fn new(tiers: Vec<Arc<dyn AiringSource>>, tier_timeout: Duration, cache_ttl: Duration) -> Self {
        let cache_key = tiers
            .iter()
            .map(|tier| tier.signature())
            .collect::<Vec<_>>()
            .join("|");
        let counters = tiers.iter().map(|_| TierCounters::default()).collect();

        Self {
            tiers,
            counters,
            tier_timeout,
            cache: TtlCache::new(cache_ttl),
            cache_key,
            last_tier: RwLock::new(None),
        }
    }

    /// Currently airing song, or `Unavailable`
    pub async fn fetch(&self) -> Fetched {
        if let Some(airing) = self.cache.get(&self.cache_key).await {
            debug!(tier = %airing.source_tier, "Now-playing cache hit");
            return Fetched::Airing {
                airing,
                cached: true,
            };
        }

        let mut failures = Vec::new();
        for (tier, counters) in self.tiers.iter().zip(&self.counters) {
            let name = tier.tier();
            debug!(tier = %name, "Trying scraper tier");

            let outcome = match tokio::time::timeout(self.tier_timeout, tier.fetch()).await {
                Ok(outcome) => outcome,
                Err(_) => TierOutcome::Error(format!(
                    "timed out after {}s",
                    self.tier_timeout.as_secs_f32()
                )),
            };

            match outcome {
                TierOutcome::Success(airing) => {
                    counters.successes.fetch_add(1, Ordering::Relaxed);
                    *self.last_tier.write().await = Some(name);
                    debug!(
                        tier = %name,
                        artist = %airing.artist_text,
                        title = %airing.title_text,
                        "Scraper tier succeeded"
                    );
                    self.cache.insert(self.cache_key.clone(), airing.clone()).await;
                    return Fetched::Airing {
                        airing,
                        cached: false,
                    };
                }
                TierOutcome::Empty => {
                    counters.empties.fetch_add(1, Ordering::Relaxed);
                    debug!(tier = %name, "Scraper tier returned nothing");
                    failures.push(format!("{}: empty", name));
                }
                TierOutcome::Error(reason) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(tier = %name, error = %reason, "Scraper tier failed");
                    failures.push(format!("{}: {}", name, reason));
                }
            }
        }

        Fetched::Unavailable { failures }
    }

    /// Tier that produced the most recent fresh observation
    pub async fn last_tier(&self) -> Option<SourceTier> {
        *self.last_tier.read().await
    }

    /// Per-tier counters in priority order
    pub fn tier_diagnostics(&self) -> Vec<TierDiagnostics> {
        self.tiers
            .iter()
            .zip(&self.counters)
            .map(|(tier, counters)| TierDiagnostics {
                tier: Some(tier.tier()),
                successes: counters.successes.load(Ordering::Relaxed),
                empties: counters.empties.load(Ordering::Relaxed),
                failures: counters.failures.load(Ordering::Relaxed),
            })
            .collect()
    }
}
