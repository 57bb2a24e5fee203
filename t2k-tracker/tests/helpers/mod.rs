//! Shared fixtures for tracker integration tests
//!
//! - a small chart with position history and fun facts
//! - a scripted airing source that replays queued tier outcomes
//! - an in-memory cover art lookup and a recording notification sink
//! - `build_coordinator` wiring them into an `UpdateCoordinator`

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use t2k_common::events::EventBus;
use t2k_tracker::chart::ChartStore;
use t2k_tracker::coordinator::{CoordinatorConfig, Pipeline, UpdateCoordinator};
use t2k_tracker::coverart::{CoverArtLookup, CoverArtResolver};
use t2k_tracker::matcher::{FuzzyMatcher, MatchConfig};
use t2k_tracker::models::{ChartEntry, NotificationSettings, OutboundMessage, RawAiring, SourceTier};
use t2k_tracker::notify::NotificationSink;
use t2k_tracker::rules::RuleBook;
use t2k_tracker::scraper::{AiringSource, MetadataScraper, TierOutcome};
use t2k_tracker::trend::TrendEngine;
use t2k_tracker::TrackerResult;

/// Edition under test; Queen's 2022 position is the prior edition
pub const EDITION_YEAR: i32 = 2023;

/// Five songs, positions 1-5, ids equal to positions
pub fn sample_entries() -> Vec<ChartEntry> {
    vec![
        ChartEntry::new(1, 1, "Queen", "Bohemian Rhapsody")
            .with_year(1975)
            .with_fun_facts(["Recorded at six different studios"])
            .with_history([(2024, 1), (2023, 1), (2022, 2)]),
        ChartEntry::new(2, 2, "Eagles", "Hotel California")
            .with_year(1977)
            .with_history([(2022, 3), (2023, 2)]),
        ChartEntry::new(3, 3, "Queen", "Love of My Life")
            .with_year(1975)
            .with_history([(2022, 8), (2023, 3)]),
        ChartEntry::new(4, 4, "Pink Floyd", "Wish You Were Here")
            .with_year(1975)
            .with_history([(2022, 4), (2023, 4)]),
        ChartEntry::new(5, 5, "Golden Earring", "Radar Love")
            .with_year(1973)
            .with_history([(2023, 5)]),
    ]
}

pub fn sample_chart() -> Arc<ChartStore> {
    Arc::new(ChartStore::new(sample_entries(), EDITION_YEAR).expect("valid sample chart"))
}

pub fn airing(artist: &str, title: &str) -> TierOutcome {
    TierOutcome::Success(RawAiring::new(artist, title, SourceTier::Structured))
}

/// Airing source replaying queued outcomes; repeats the last one when drained
pub struct ScriptedSource {
    tier: SourceTier,
    script: Mutex<VecDeque<TierOutcome>>,
    last: Mutex<TierOutcome>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(outcomes: Vec<TierOutcome>) -> Self {
        Self {
            tier: SourceTier::Structured,
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(TierOutcome::Empty),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, outcome: TierOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiringSource for ScriptedSource {
    fn tier(&self) -> SourceTier {
        self.tier
    }

    fn signature(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self) -> TierOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next {
            *last = outcome;
        }
        last.clone()
    }
}

/// Cover art lookup answering every song with a URL derived from its title
#[derive(Default)]
pub struct StaticLookup {
    pub calls: AtomicUsize,
    delay: Duration,
}

impl StaticLookup {
    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl CoverArtLookup for StaticLookup {
    async fn lookup(&self, _artist: &str, title: &str) -> TrackerResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Some(format!(
            "https://art.example/{}.jpg",
            title.to_lowercase().replace(' ', "-")
        )))
    }
}

/// Sink keeping every delivered message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, message: &OutboundMessage) -> TrackerResult<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct Harness {
    pub coordinator: Arc<UpdateCoordinator>,
    pub sink: Arc<RecordingSink>,
    pub lookup: Arc<StaticLookup>,
    pub event_bus: EventBus,
}

/// Coordinator over `sample_chart` with no scraper cache
pub fn build_coordinator(
    source: Arc<ScriptedSource>,
    config: CoordinatorConfig,
    rules: RuleBook,
    settings: NotificationSettings,
) -> Harness {
    build_coordinator_with_lookup(
        source,
        config,
        rules,
        settings,
        Arc::new(StaticLookup::default()),
    )
}

pub fn build_coordinator_with_lookup(
    source: Arc<ScriptedSource>,
    config: CoordinatorConfig,
    rules: RuleBook,
    settings: NotificationSettings,
    lookup: Arc<StaticLookup>,
) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let event_bus = EventBus::new(100);

    let pipeline = Pipeline {
        chart: sample_chart(),
        scraper: MetadataScraper::new(
            vec![source as Arc<dyn AiringSource>],
            Duration::from_secs(5),
            Duration::ZERO,
        ),
        matcher: FuzzyMatcher::new(MatchConfig::default()),
        trend: TrendEngine::new(EDITION_YEAR, 5),
        cover_art: CoverArtResolver::new(
            Arc::clone(&lookup) as Arc<dyn CoverArtLookup>,
            Duration::from_secs(24 * 3600),
        ),
    };

    let coordinator = UpdateCoordinator::new(
        pipeline,
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
        event_bus.clone(),
        config,
    )
    .with_rules(rules)
    .with_settings(settings);

    Harness {
        coordinator: Arc::new(coordinator),
        sink,
        lookup,
        event_bus,
    }
}

/// Upcoming count of 3 keeps assertions short
pub fn small_config() -> CoordinatorConfig {
    CoordinatorConfig {
        upcoming_count: 3,
        ..CoordinatorConfig::default()
    }
}
