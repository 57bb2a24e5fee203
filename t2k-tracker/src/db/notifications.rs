//! Notification rules and the singleton settings row

use crate::error::TrackerResult;
use crate::models::{NotificationRule, NotificationSettings, RuleId, RuleKind};
use crate::rules::RuleBook;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::str::FromStr;
use t2k_common::Error;
use tracing::{debug, info, warn};

/// Load every stored rule
///
/// Rows with an unsupported type or an empty pattern are skipped with a
/// warning; they never reach the rule engine.
pub async fn load_rules(pool: &SqlitePool) -> TrackerResult<RuleBook> {
    let rows: Vec<(i64, String, String, bool)> = sqlx::query_as(
        "SELECT id, rule_type, match_pattern, enabled FROM notification_rules ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    let mut book = RuleBook::new();
    for (id, rule_type, pattern, enabled) in rows {
        let rule = RuleKind::from_str(&rule_type)
            .and_then(|kind| NotificationRule::new(id, kind, pattern));
        match rule {
            Ok(rule) if enabled => {
                book.insert(rule);
            }
            Ok(rule) => {
                book.insert(rule.disabled());
            }
            Err(e) => warn!(rule_id = id, error = %e, "Skipping stored notification rule"),
        }
    }

    debug!(rules = book.len(), "Notification rules loaded");
    Ok(book)
}

/// Validate and store a new enabled rule
pub async fn add_rule(
    pool: &SqlitePool,
    kind: RuleKind,
    pattern: &str,
) -> TrackerResult<NotificationRule> {
    // Validate before touching the table
    NotificationRule::new(0, kind, pattern)?;

    let result = sqlx::query(
        "INSERT INTO notification_rules (rule_type, match_pattern, enabled) VALUES (?, ?, 1)",
    )
    .bind(kind.as_str())
    .bind(pattern)
    .execute(pool)
    .await
    .map_err(Error::from)?;

    let rule = NotificationRule::new(result.last_insert_rowid(), kind, pattern)?;
    info!(rule_id = %rule.id, kind = kind.as_str(), pattern = %pattern, "Notification rule added");
    Ok(rule)
}

/// Delete a rule; returns whether it existed
pub async fn delete_rule(pool: &SqlitePool, id: RuleId) -> TrackerResult<bool> {
    let result = sqlx::query("DELETE FROM notification_rules WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_rule_enabled(pool: &SqlitePool, id: RuleId, enabled: bool) -> TrackerResult<bool> {
    let result = sqlx::query("UPDATE notification_rules SET enabled = ? WHERE id = ?")
        .bind(enabled)
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(result.rows_affected() > 0)
}

/// Stored settings, or the defaults when no row exists
pub async fn load_settings(pool: &SqlitePool) -> TrackerResult<NotificationSettings> {
    let row: Option<(Option<String>, Option<bool>, Option<bool>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT notification_targets, notify_current_song, notify_upcoming_song,
               upcoming_notify_positions
        FROM notification_settings WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .map_err(Error::from)?;

    let defaults = NotificationSettings::default();
    let Some((targets, notify_current, notify_upcoming, positions)) = row else {
        return Ok(defaults);
    };

    Ok(NotificationSettings {
        targets: parse_json_set(targets.as_deref(), "notification_targets")
            .unwrap_or(defaults.targets),
        notify_current: notify_current.unwrap_or(defaults.notify_current),
        notify_upcoming: notify_upcoming.unwrap_or(defaults.notify_upcoming),
        upcoming_positions: parse_json_set(positions.as_deref(), "upcoming_notify_positions")
            .unwrap_or(defaults.upcoming_positions),
    })
}

pub async fn save_settings(pool: &SqlitePool, settings: &NotificationSettings) -> TrackerResult<()> {
    let targets = serde_json::to_string(&settings.targets)
        .map_err(|e| Error::Internal(format!("Serialize targets failed: {}", e)))?;
    let positions = serde_json::to_string(&settings.upcoming_positions)
        .map_err(|e| Error::Internal(format!("Serialize positions failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO notification_settings (
            id, notification_targets, notify_current_song, notify_upcoming_song,
            upcoming_notify_positions, updated_at
        ) VALUES (1, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            notification_targets = excluded.notification_targets,
            notify_current_song = excluded.notify_current_song,
            notify_upcoming_song = excluded.notify_upcoming_song,
            upcoming_notify_positions = excluded.upcoming_notify_positions,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(targets)
    .bind(settings.notify_current)
    .bind(settings.notify_upcoming)
    .bind(positions)
    .execute(pool)
    .await
    .map_err(Error::from)?;

    Ok(())
}

/// JSON array column; `None` when missing or malformed
fn parse_json_set<T>(raw: Option<&str>, column: &str) -> Option<BTreeSet<T>>
where
    T: serde::de::DeserializeOwned + Ord,
{
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(column, error = %e, "Ignoring malformed settings column");
            None
        }
    }
}
