//! Validated tracker settings
//!
//! Built once from the TOML bootstrap config. Anything out of range is
//! rejected here with `ConfigurationInvalid` and never reaches the
//! coordinator.

use crate::error::{TrackerError, TrackerResult};
use crate::matcher::MatchConfig;
use std::time::Duration;
use t2k_common::config::{BroadcastOrder, TomlConfig};
use tracing::info;

pub const ALLOWED_UPCOMING_COUNTS: [usize; 2] = [10, 20];
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 15;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 120;

/// Upstream endpoints
#[derive(Debug, Clone)]
pub struct SourceUrls {
    pub structured: String,
    pub embedded: String,
    pub html: String,
    pub musicbrainz: String,
    pub cover_art_archive: String,
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub upcoming_count: usize,
    pub update_interval: Duration,
    pub notifications_enabled: bool,
    pub matching: MatchConfig,
    pub unresolved_clear_after: u32,
    pub edition_year: i32,
    pub broadcast_order: BroadcastOrder,
    pub history_limit: usize,
    pub tier_timeout: Duration,
    pub metadata_ttl: Duration,
    pub cover_art_ttl: Duration,
    /// Per-lookup bound while building a new state
    pub cover_art_timeout: Duration,
    pub sources: SourceUrls,
}

fn invalid(message: String) -> TrackerError {
    TrackerError::ConfigurationInvalid(message)
}

impl TrackerSettings {
    pub fn from_toml(config: &TomlConfig) -> TrackerResult<Self> {
        let tracker = &config.tracker;
        let sources = &config.sources;

        let upcoming_count = tracker.upcoming_count as usize;
        if !ALLOWED_UPCOMING_COUNTS.contains(&upcoming_count) {
            return Err(invalid(format!(
                "upcoming_count must be 10 or 20, got {}",
                tracker.upcoming_count
            )));
        }

        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS)
            .contains(&tracker.update_interval_seconds)
        {
            return Err(invalid(format!(
                "update_interval_seconds must be within {}-{}, got {}",
                MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS, tracker.update_interval_seconds
            )));
        }

        if !(tracker.match_threshold > 0.0 && tracker.match_threshold <= 1.0) {
            return Err(invalid(format!(
                "match_threshold must be in (0, 1], got {}",
                tracker.match_threshold
            )));
        }

        if !(0.0..1.0).contains(&tracker.tie_epsilon) {
            return Err(invalid(format!(
                "tie_epsilon must be in [0, 1), got {}",
                tracker.tie_epsilon
            )));
        }

        if sources.tier_timeout_seconds == 0 {
            return Err(invalid("tier_timeout_seconds must be positive".to_string()));
        }

        if sources.cover_art_timeout_seconds == 0 {
            return Err(invalid("cover_art_timeout_seconds must be positive".to_string()));
        }

        for (name, url) in [
            ("structured_url", &sources.structured_url),
            ("embedded_url", &sources.embedded_url),
            ("html_url", &sources.html_url),
            ("musicbrainz_url", &sources.musicbrainz_url),
            ("cover_art_archive_url", &sources.cover_art_archive_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!("{} is not an http(s) URL: '{}'", name, url)));
            }
        }

        let settings = Self {
            upcoming_count,
            update_interval: Duration::from_secs(tracker.update_interval_seconds),
            notifications_enabled: tracker.notifications_enabled,
            matching: MatchConfig {
                threshold: tracker.match_threshold,
                tie_epsilon: tracker.tie_epsilon,
            },
            unresolved_clear_after: tracker.unresolved_clear_after,
            edition_year: tracker.edition_year,
            broadcast_order: tracker.broadcast_order,
            history_limit: tracker.history_limit,
            tier_timeout: Duration::from_secs(sources.tier_timeout_seconds),
            metadata_ttl: Duration::from_secs(sources.metadata_cache_seconds),
            cover_art_ttl: Duration::from_secs(sources.cover_art_cache_hours * 3600),
            cover_art_timeout: Duration::from_secs(sources.cover_art_timeout_seconds),
            sources: SourceUrls {
                structured: sources.structured_url.clone(),
                embedded: sources.embedded_url.clone(),
                html: sources.html_url.clone(),
                musicbrainz: sources.musicbrainz_url.clone(),
                cover_art_archive: sources.cover_art_archive_url.clone(),
            },
        };

        info!(
            upcoming = settings.upcoming_count,
            interval_secs = tracker.update_interval_seconds,
            edition = settings.edition_year,
            order = ?settings.broadcast_order,
            "Tracker settings validated"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = TrackerSettings::from_toml(&TomlConfig::default()).unwrap();
        assert_eq!(settings.upcoming_count, 10);
        assert_eq!(settings.update_interval, Duration::from_secs(30));
        assert_eq!(settings.metadata_ttl, Duration::from_secs(30));
        assert_eq!(settings.cover_art_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(settings.cover_art_timeout, Duration::from_secs(10));
        assert_eq!(settings.unresolved_clear_after, 2);
    }

    #[test]
    fn test_interval_bounds() {
        let mut config = TomlConfig::default();
        config.tracker.update_interval_seconds = 15;
        assert!(TrackerSettings::from_toml(&config).is_ok());
        config.tracker.update_interval_seconds = 120;
        assert!(TrackerSettings::from_toml(&config).is_ok());
        config.tracker.update_interval_seconds = 14;
        assert!(matches!(
            TrackerSettings::from_toml(&config),
            Err(TrackerError::ConfigurationInvalid(_))
        ));
        config.tracker.update_interval_seconds = 121;
        assert!(TrackerSettings::from_toml(&config).is_err());
    }

    #[test]
    fn test_upcoming_count_must_be_10_or_20() {
        let mut config = TomlConfig::default();
        config.tracker.upcoming_count = 20;
        assert!(TrackerSettings::from_toml(&config).is_ok());
        config.tracker.upcoming_count = 15;
        assert!(TrackerSettings::from_toml(&config).is_err());
    }

    #[test]
    fn test_threshold_range() {
        let mut config = TomlConfig::default();
        config.tracker.match_threshold = 0.0;
        assert!(TrackerSettings::from_toml(&config).is_err());
        config.tracker.match_threshold = 1.2;
        assert!(TrackerSettings::from_toml(&config).is_err());
    }

    #[test]
    fn test_zero_cover_art_timeout_rejected() {
        let mut config = TomlConfig::default();
        config.sources.cover_art_timeout_seconds = 0;
        assert!(matches!(
            TrackerSettings::from_toml(&config),
            Err(TrackerError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn test_non_http_source_rejected() {
        let mut config = TomlConfig::default();
        config.sources.html_url = "ftp://example.org/list".to_string();
        assert!(TrackerSettings::from_toml(&config).is_err());
    }
}
