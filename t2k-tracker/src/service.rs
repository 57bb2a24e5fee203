//! Periodic poll loop
//!
//! Drives [`UpdateCoordinator::poll`] on a fixed interval until stopped.
//! Ticks missed while a slow poll runs are skipped, not queued. Stopping
//! cancels any in-flight poll; its result is dropped unapplied.

use crate::coordinator::{PollOutcome, UpdateCoordinator};
use crate::models::{CoordinatorState, Diagnostics};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use t2k_common::events::TrackerEvent;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct TrackerService {
    coordinator: Arc<UpdateCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
    session_id: Uuid,
    handle: Mutex<Option<JoinHandle<u64>>>,
}

impl TrackerService {
    pub fn new(coordinator: Arc<UpdateCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            cancel: CancellationToken::new(),
            session_id: Uuid::new_v4(),
            handle: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    pub fn snapshot(&self) -> Arc<CoordinatorState> {
        self.coordinator.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CoordinatorState>> {
        self.coordinator.subscribe()
    }

    pub fn subscribe_diagnostics(&self) -> watch::Receiver<Diagnostics> {
        self.coordinator.subscribe_diagnostics()
    }

    /// Token cancelled by [`stop`](Self::stop)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the poll loop; the first poll runs immediately
    ///
    /// Calling `start` on a running service does nothing.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            debug!("Tracker already running");
            return;
        }

        info!(
            session_id = %self.session_id,
            interval_secs = self.interval.as_secs(),
            "Starting tracker"
        );
        self.coordinator
            .event_bus()
            .emit_lossy(TrackerEvent::TrackerStarted {
                session_id: self.session_id,
                interval_seconds: self.interval.as_secs(),
                timestamp: Utc::now(),
            });

        *handle = Some(tokio::spawn(run_loop(
            Arc::clone(&self.coordinator),
            self.interval,
            self.cancel.clone(),
        )));
    }

    /// Cancel the loop and wait for it to finish
    pub async fn stop(&self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };

        let polls = match handle.await {
            Ok(polls) => polls,
            Err(e) => {
                warn!(error = %e, "Tracker task ended abnormally");
                0
            }
        };

        info!(session_id = %self.session_id, polls, "Tracker stopped");
        self.coordinator
            .event_bus()
            .emit_lossy(TrackerEvent::TrackerStopped {
                session_id: self.session_id,
                polls,
                timestamp: Utc::now(),
            });
    }

    /// Run a single poll outside the loop
    pub async fn poll_once(&self) -> PollOutcome {
        self.coordinator.poll(&self.cancel).await
    }
}

/// Returns the number of ticks that ran a poll
async fn run_loop(
    coordinator: Arc<UpdateCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut polls = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PollOutcome::Discarded,
                    outcome = coordinator.poll(&cancel) => outcome,
                };
                polls += 1;
                debug!(?outcome, "Poll finished");
                if outcome == PollOutcome::Discarded {
                    break;
                }
            }
        }
    }

    polls
}
