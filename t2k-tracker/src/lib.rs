//! t2k-tracker library interface
//!
//! Live "now playing" pipeline for the NPO Radio 2 Top 2000 broadcast:
//! scraper tiers → fuzzy matcher → trend engine → cover art resolver →
//! update coordinator → notification rule engine.

pub mod api;
pub mod cache;
pub mod chart;
pub mod config;
pub mod coordinator;
pub mod coverart;
pub mod db;
pub mod error;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod reload;
pub mod rules;
pub mod scraper;
pub mod service;
pub mod trend;

pub use crate::error::{ApiError, ApiResult, TrackerError, TrackerResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use t2k_common::events::EventBus;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::models::{CoordinatorState, Diagnostics};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Snapshots published by the coordinator
    pub state_rx: watch::Receiver<Arc<CoordinatorState>>,
    /// Poll counters, updated by every poll
    pub diagnostics_rx: watch::Receiver<Diagnostics>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub chart_entries: usize,
    pub edition_year: i32,
    /// Cancelled on shutdown; ends open event streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        state_rx: watch::Receiver<Arc<CoordinatorState>>,
        diagnostics_rx: watch::Receiver<Diagnostics>,
        event_bus: EventBus,
        chart_entries: usize,
        edition_year: i32,
    ) -> Self {
        Self {
            state_rx,
            diagnostics_rx,
            event_bus,
            startup_time: Utc::now(),
            chart_entries,
            edition_year,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<CoordinatorState> {
        self.state_rx.borrow().clone()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics_rx.borrow().clone()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::state_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
