//! Notification rule and settings reload
//!
//! Rules and settings are edited through the `rules` and `notify`
//! subcommands, usually while a tracker runs in another process. The running
//! tracker re-reads both tables on an interval and swaps them into the
//! coordinator. Dedupe state lives in the coordinator and survives a reload.

use crate::coordinator::UpdateCoordinator;
use crate::db;
use crate::error::TrackerResult;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Load stored rules and settings into the coordinator
///
/// Returns the number of rules now active (enabled or not).
pub async fn reload_notifications(
    pool: &SqlitePool,
    coordinator: &UpdateCoordinator,
) -> TrackerResult<usize> {
    let rules = db::notifications::load_rules(pool).await?;
    let settings = db::notifications::load_settings(pool).await?;
    let count = rules.len();

    coordinator.replace_rules(rules).await;
    coordinator.update_settings(settings).await;
    debug!(rules = count, "Notification config reloaded");
    Ok(count)
}

/// Reload on every `interval` until `cancel` fires
///
/// The first reload happens one interval after spawning; startup loads the
/// tables itself. A failed reload keeps the previous rules.
pub fn spawn_reloader(
    pool: SqlitePool,
    coordinator: Arc<UpdateCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = reload_notifications(&pool, &coordinator).await {
                        warn!(error = %e, "Notification reload failed, keeping previous rules");
                    }
                }
            }
        }
        debug!("Notification reloader stopped");
    })
}
