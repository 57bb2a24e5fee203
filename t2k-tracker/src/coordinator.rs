//! Update coordinator
//!
//! One poll runs scraper → matcher → trend engine → cover art resolver and
//! decides whether the airing song changed. State is published through a
//! `tokio::sync::watch` channel as a fully built `Arc<CoordinatorState>`, so
//! readers never observe a partial update. Poll counters travel on a second
//! channel, so a receiver of the state channel wakes only when the songs
//! change.
//!
//! # Poll outcomes
//!
//! - **Unavailable**: keep the previous state, count the failure
//! - **Unresolved**: keep `current` until more than `unresolved_clear_after`
//!   consecutive unresolved polls, then clear it
//! - **SongChanged**: rebuild current + upcoming, publish, run the rule engine
//!
//! A poll that finds another poll in flight returns `Skipped` immediately.

use crate::chart::ChartStore;
use crate::config::TrackerSettings;
use crate::coverart::CoverArtResolver;
use crate::matcher::FuzzyMatcher;
use crate::models::{
    ChartEntry, ChartEntryId, CoordinatorState, Diagnostics, NotificationSettings, RawAiring,
    ResolvedSong, SourceTier,
};
use crate::notify::NotificationSink;
use crate::rules::{RuleBook, RuleEngine};
use crate::scraper::{Fetched, MetadataScraper};
use crate::trend::TrendEngine;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use t2k_common::config::BroadcastOrder;
use t2k_common::events::{EventBus, TrackerEvent};
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coordinator policy
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub upcoming_count: usize,
    /// Consecutive unresolved polls tolerated before `current` is cleared
    pub unresolved_clear_after: u32,
    pub broadcast_order: BroadcastOrder,
    pub notifications_enabled: bool,
    /// Upper bound on each cover art lookup while building a new state
    pub cover_art_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            upcoming_count: 10,
            unresolved_clear_after: 2,
            broadcast_order: BroadcastOrder::Ascending,
            notifications_enabled: true,
            cover_art_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&TrackerSettings> for CoordinatorConfig {
    fn from(settings: &TrackerSettings) -> Self {
        Self {
            upcoming_count: settings.upcoming_count,
            unresolved_clear_after: settings.unresolved_clear_after,
            broadcast_order: settings.broadcast_order,
            notifications_enabled: settings.notifications_enabled,
            cover_art_timeout: settings.cover_art_timeout,
        }
    }
}

/// Resolution stages a coordinator drives
pub struct Pipeline {
    pub chart: Arc<ChartStore>,
    pub scraper: MetadataScraper,
    pub matcher: FuzzyMatcher,
    pub trend: TrendEngine,
    pub cover_art: CoverArtResolver,
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Another poll was in flight
    Skipped,
    /// Cancelled before the result was applied
    Discarded,
    Unavailable {
        consecutive_failures: u32,
    },
    Unresolved {
        best_score: f64,
        consecutive: u32,
    },
    /// `current` was cleared after persistent unresolved polls
    Cleared {
        unresolved_polls: u32,
    },
    Unchanged {
        entry_id: ChartEntryId,
    },
    SongChanged {
        entry_id: ChartEntryId,
        notifications: usize,
    },
}

/// Bookkeeping owned by whichever poll holds the lock
#[derive(Default)]
struct PollBook {
    polls: u64,
    last_poll_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    total_failures: u64,
    consecutive_unresolved: u32,
    notifications_sent: u64,
    /// Times each entry has become current this session
    airings: HashMap<ChartEntryId, u32>,
    rule_engine: RuleEngine,
}

pub struct UpdateCoordinator {
    pipeline: Pipeline,
    sink: Arc<dyn NotificationSink>,
    event_bus: EventBus,
    config: CoordinatorConfig,
    rules: RwLock<RuleBook>,
    settings: RwLock<NotificationSettings>,
    book: Mutex<PollBook>,
    state_tx: watch::Sender<Arc<CoordinatorState>>,
    diagnostics_tx: watch::Sender<Diagnostics>,
}

impl UpdateCoordinator {
    pub fn new(
        pipeline: Pipeline,
        sink: Arc<dyn NotificationSink>,
        event_bus: EventBus,
        config: CoordinatorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(CoordinatorState::default()));
        let (diagnostics_tx, _) = watch::channel(Diagnostics::default());
        Self {
            pipeline,
            sink,
            event_bus,
            config,
            rules: RwLock::new(RuleBook::new()),
            settings: RwLock::new(NotificationSettings::default()),
            book: Mutex::new(PollBook::default()),
            state_tx,
            diagnostics_tx,
        }
    }

    pub fn with_rules(self, rules: RuleBook) -> Self {
        Self {
            rules: RwLock::new(rules),
            ..self
        }
    }

    pub fn with_settings(self, settings: NotificationSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            ..self
        }
    }

    /// Latest published snapshot
    pub fn state(&self) -> Arc<CoordinatorState> {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<CoordinatorState>> {
        self.state_tx.subscribe()
    }

    /// Counters as of the latest poll
    ///
    /// Snapshots carry the counters from when they were published; this is
    /// updated by every poll.
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics_tx.borrow().clone()
    }

    pub fn subscribe_diagnostics(&self) -> watch::Receiver<Diagnostics> {
        self.diagnostics_tx.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn chart(&self) -> &Arc<ChartStore> {
        &self.pipeline.chart
    }

    /// Swap in a new rule set; takes effect on the next song change
    pub async fn replace_rules(&self, rules: RuleBook) {
        *self.rules.write().await = rules;
    }

    pub async fn update_settings(&self, settings: NotificationSettings) {
        *self.settings.write().await = settings;
    }

    /// Run one poll cycle
    ///
    /// Never fails: every error is absorbed into the returned outcome.
    pub async fn poll(&self, cancel: &CancellationToken) -> PollOutcome {
        let Ok(mut book) = self.book.try_lock() else {
            debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        };
        book.polls += 1;
        book.last_poll_at = Some(Utc::now());

        let fetched = self.pipeline.scraper.fetch().await;
        if cancel.is_cancelled() {
            return PollOutcome::Discarded;
        }

        let airing = match fetched {
            Fetched::Airing { airing, .. } => {
                book.consecutive_failures = 0;
                airing
            }
            Fetched::Unavailable { failures } => {
                book.consecutive_failures += 1;
                book.total_failures += 1;
                warn!(
                    consecutive = book.consecutive_failures,
                    "Source unavailable: {}",
                    failures.join("; ")
                );
                self.event_bus.emit_lossy(TrackerEvent::SourceUnavailable {
                    failures,
                    timestamp: Utc::now(),
                });
                self.publish_diagnostics(&book).await;
                return PollOutcome::Unavailable {
                    consecutive_failures: book.consecutive_failures,
                };
            }
        };

        let result = self
            .pipeline
            .matcher
            .match_airing(&airing, &self.pipeline.chart);
        let Some(entry) = result.entry else {
            return self.unresolved(&mut book, &airing, result.confidence).await;
        };
        book.consecutive_unresolved = 0;

        if self.state().current_entry_id() == Some(entry.id) {
            self.publish_diagnostics(&book).await;
            return PollOutcome::Unchanged { entry_id: entry.id };
        }

        let entry_id = entry.id;
        let epoch = book.airings.get(&entry_id).copied().unwrap_or(0) + 1;
        let mut state = self
            .build_state(&book, entry, result.confidence, &airing, epoch)
            .await;
        if cancel.is_cancelled() {
            return PollOutcome::Discarded;
        }

        book.airings.insert(entry_id, epoch);
        state.last_change_at = Some(Utc::now());
        state.diagnostics = self.collect_diagnostics(&book).await;
        self.diagnostics_tx.send_replace(state.diagnostics.clone());
        let state = Arc::new(state);
        self.state_tx.send_replace(Arc::clone(&state));

        let notifications = match state.current.as_ref() {
            Some(current) => {
                info!(
                    position = current.entry.position,
                    artist = %current.entry.artist,
                    title = %current.entry.title,
                    confidence = current.match_confidence,
                    tier = %airing.source_tier,
                    "Song changed"
                );
                self.event_bus.emit_lossy(TrackerEvent::SongChanged {
                    entry_id: current.entry.id.0,
                    position: current.entry.position,
                    artist: current.entry.artist.clone(),
                    title: current.entry.title.clone(),
                    confidence: current.match_confidence,
                    source: airing.source_tier.to_string(),
                    occurrence_epoch: epoch,
                    timestamp: Utc::now(),
                });

                if self.config.notifications_enabled {
                    self.notify(&mut book, &state).await
                } else {
                    0
                }
            }
            None => 0,
        };

        if notifications > 0 {
            self.publish_diagnostics(&book).await;
        }

        PollOutcome::SongChanged {
            entry_id,
            notifications,
        }
    }

    async fn unresolved(&self, book: &mut PollBook, airing: &RawAiring, best_score: f64) -> PollOutcome {
        book.consecutive_unresolved += 1;
        warn!(
            artist = %airing.artist_text,
            title = %airing.title_text,
            best_score,
            consecutive = book.consecutive_unresolved,
            "Airing did not match the chart"
        );
        self.event_bus.emit_lossy(TrackerEvent::SongUnresolved {
            artist: airing.artist_text.clone(),
            title: airing.title_text.clone(),
            best_score,
            source: airing.source_tier.to_string(),
            timestamp: Utc::now(),
        });

        let has_current = self.state_tx.borrow().current.is_some();
        if has_current && book.consecutive_unresolved > self.config.unresolved_clear_after {
            let diagnostics = self.collect_diagnostics(book).await;
            self.diagnostics_tx.send_replace(diagnostics.clone());
            let state = CoordinatorState {
                current: None,
                upcoming: Vec::new(),
                last_change_at: Some(Utc::now()),
                diagnostics,
            };
            self.state_tx.send_replace(Arc::new(state));

            info!(
                unresolved_polls = book.consecutive_unresolved,
                "Cleared current song after persistent unresolved polls"
            );
            self.event_bus.emit_lossy(TrackerEvent::CurrentCleared {
                unresolved_polls: book.consecutive_unresolved,
                timestamp: Utc::now(),
            });
            return PollOutcome::Cleared {
                unresolved_polls: book.consecutive_unresolved,
            };
        }

        self.publish_diagnostics(book).await;
        PollOutcome::Unresolved {
            best_score,
            consecutive: book.consecutive_unresolved,
        }
    }

    /// Build the next state for a newly current entry
    ///
    /// Cover art for the current and upcoming songs is fetched concurrently.
    /// Failed lookups and lookups exceeding `cover_art_timeout` leave the URL
    /// empty.
    async fn build_state(
        &self,
        book: &PollBook,
        entry: Arc<ChartEntry>,
        confidence: f64,
        airing: &RawAiring,
        epoch: u32,
    ) -> CoordinatorState {
        let upcoming = self.pipeline.chart.upcoming(
            entry.position,
            self.config.upcoming_count,
            self.config.broadcast_order,
        );

        let current_cover = async {
            match airing.image_url.as_deref() {
                Some(url) => {
                    self.pipeline.cover_art.remember(&entry, url).await;
                    Some(url.to_string())
                }
                None => self.cover_for(&entry).await,
            }
        };
        let upcoming_covers = join_all(upcoming.iter().map(|next| self.cover_for(next)));
        let (current_cover, upcoming_covers) = futures::join!(current_cover, upcoming_covers);

        let upcoming = upcoming
            .into_iter()
            .zip(upcoming_covers)
            .map(|(next, cover)| {
                let next_epoch = book.airings.get(&next.id).copied().unwrap_or(0);
                self.resolve_song(next, 1.0, cover, next_epoch, None)
            })
            .collect();

        CoordinatorState {
            current: Some(self.resolve_song(
                entry,
                confidence,
                current_cover,
                epoch,
                Some(airing.source_tier),
            )),
            upcoming,
            last_change_at: None,
            diagnostics: Diagnostics::default(),
        }
    }

    async fn cover_for(&self, entry: &ChartEntry) -> Option<String> {
        let lookup = self.pipeline.cover_art.resolve(entry);
        match tokio::time::timeout(self.config.cover_art_timeout, lookup).await {
            Ok(url) => url,
            Err(_) => {
                warn!(
                    position = entry.position,
                    timeout_secs = self.config.cover_art_timeout.as_secs(),
                    "Cover art lookup timed out"
                );
                None
            }
        }
    }

    fn resolve_song(
        &self,
        entry: Arc<ChartEntry>,
        confidence: f64,
        cover_art_url: Option<String>,
        occurrence_epoch: u32,
        source_tier: Option<SourceTier>,
    ) -> ResolvedSong {
        let trend = self.pipeline.trend.compute(&entry);
        ResolvedSong {
            history: self.pipeline.trend.history(&entry),
            trend_label: trend.label(),
            trend,
            entry,
            match_confidence: confidence.clamp(0.0, 1.0),
            cover_art_url,
            occurrence_epoch,
            source_tier,
        }
    }

    async fn notify(&self, book: &mut PollBook, state: &CoordinatorState) -> usize {
        let messages = {
            let rules = self.rules.read().await;
            let settings = self.settings.read().await;
            book.rule_engine.evaluate(state, &rules, &settings)
        };

        for message in &messages {
            match self.sink.deliver(message).await {
                Ok(()) => debug!(
                    target_id = %message.target_id,
                    rule_id = %message.rule_id,
                    "Notification delivered"
                ),
                Err(e) => warn!(
                    target_id = %message.target_id,
                    error = %e,
                    "Notification delivery failed"
                ),
            }
        }

        book.notifications_sent += messages.len() as u64;
        messages.len()
    }

    async fn collect_diagnostics(&self, book: &PollBook) -> Diagnostics {
        Diagnostics {
            polls: book.polls,
            last_poll_at: book.last_poll_at,
            consecutive_failures: book.consecutive_failures,
            total_failures: book.total_failures,
            consecutive_unresolved: book.consecutive_unresolved,
            last_tier: self.pipeline.scraper.last_tier().await,
            tiers: self.pipeline.scraper.tier_diagnostics(),
            notifications_sent: book.notifications_sent,
        }
    }

    /// Publish fresh counters without touching the song state
    async fn publish_diagnostics(&self, book: &PollBook) {
        let diagnostics = self.collect_diagnostics(book).await;
        self.diagnostics_tx.send_replace(diagnostics);
    }
}
