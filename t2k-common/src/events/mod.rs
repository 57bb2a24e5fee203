//! Event types for the tracker event system
//!
//! Provides the event definitions and the EventBus used to fan tracker activity
//! out to the SSE endpoint, notification sinks and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tracker event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag for SSE
/// transmission. They carry plain ids and strings rather than domain types so
/// that consumers need no knowledge of the tracker crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerEvent {
    /// Tracker service started polling
    TrackerStarted {
        /// Unique id of this run
        session_id: Uuid,
        /// Configured poll interval
        interval_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// Tracker service stopped (cancellation observed)
    TrackerStopped {
        session_id: Uuid,
        /// Number of polls completed during this run
        polls: u64,
        timestamp: DateTime<Utc>,
    },

    /// A different chart entry is now on air
    ///
    /// Triggers:
    /// - SSE: update connected dashboards
    /// - Rule engine: evaluate notification rules
    SongChanged {
        /// Chart entry id
        entry_id: i64,
        /// Position in the edition being broadcast
        position: u32,
        artist: String,
        title: String,
        /// Match confidence in [0, 1]
        confidence: f64,
        /// Tier that produced the observation
        source: String,
        /// How many times this entry has become current during this session
        occurrence_epoch: u32,
        timestamp: DateTime<Utc>,
    },

    /// Current song was cleared after repeated unresolved polls
    CurrentCleared {
        /// Consecutive unresolved polls when the clear happened
        unresolved_polls: u32,
        timestamp: DateTime<Utc>,
    },

    /// An airing was observed but matched nothing above threshold
    SongUnresolved {
        artist: String,
        title: String,
        /// Best candidate score (0.0 when there were no candidates)
        best_score: f64,
        source: String,
        timestamp: DateTime<Utc>,
    },

    /// Every scraper tier failed or returned nothing
    SourceUnavailable {
        /// Per-tier failure summaries in fallback order
        failures: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A notification message was handed to a sink
    NotificationIssued {
        entry_id: i64,
        position: u32,
        /// Rule that matched
        rule_id: i64,
        /// 0 for the current song, n for the n-th upcoming song
        offset: u32,
        /// Destination identifier
        target: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl TrackerEvent {
    /// Event type name, identical to the serialized `type` tag
    pub fn event_type(&self) -> &str {
        match self {
            TrackerEvent::TrackerStarted { .. } => "TrackerStarted",
            TrackerEvent::TrackerStopped { .. } => "TrackerStopped",
            TrackerEvent::SongChanged { .. } => "SongChanged",
            TrackerEvent::CurrentCleared { .. } => "CurrentCleared",
            TrackerEvent::SongUnresolved { .. } => "SongUnresolved",
            TrackerEvent::SourceUnavailable { .. } => "SourceUnavailable",
            TrackerEvent::NotificationIssued { .. } => "NotificationIssued",
        }
    }

    /// Timestamp carried by every event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TrackerEvent::TrackerStarted { timestamp, .. }
            | TrackerEvent::TrackerStopped { timestamp, .. }
            | TrackerEvent::SongChanged { timestamp, .. }
            | TrackerEvent::CurrentCleared { timestamp, .. }
            | TrackerEvent::SongUnresolved { timestamp, .. }
            | TrackerEvent::SourceUnavailable { timestamp, .. }
            | TrackerEvent::NotificationIssued { timestamp, .. } => *timestamp,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper around a `tokio::sync::broadcast` channel. Slow subscribers
/// lag and lose the oldest events; emitters never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrackerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use t2k_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TrackerEvent,
    ) -> Result<usize, broadcast::error::SendError<TrackerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleared() -> TrackerEvent {
        TrackerEvent::CurrentCleared {
            unresolved_polls: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(10);
        assert!(bus.emit(cleared()).is_err());
        // Lossy variant never fails
        bus.emit_lossy(cleared());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        assert_eq!(bus.emit(cleared()).unwrap(), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "CurrentCleared");
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = TrackerEvent::SongChanged {
            entry_id: 1,
            position: 1,
            artist: "Queen".to_string(),
            title: "Bohemian Rhapsody".to_string(),
            confidence: 1.0,
            source: "structured".to_string(),
            occurrence_epoch: 1,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["position"], 1);
    }
}
