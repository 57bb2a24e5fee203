//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds elapsed since `since`, clamped at zero
///
/// Used for uptime and "last change" ages where clock adjustments could
/// otherwise produce negative values.
pub fn seconds_since(since: DateTime<Utc>) -> u64 {
    (now() - since).num_seconds().max(0) as u64
}
