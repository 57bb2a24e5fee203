//! Notification messages and sinks
//!
//! The rule engine decides what to send and to whom; a [`NotificationSink`]
//! hands the message to whatever delivers it. Delivery transports live
//! outside this crate.

use crate::error::TrackerResult;
use crate::models::{NotificationTarget, OutboundMessage, ResolvedSong};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use t2k_common::events::{EventBus, TrackerEvent};
use tracing::{info, warn};

pub const NOTIFICATION_TITLE: &str = "NPO Radio 2 Top 2000";

/// Message body for a song at `offset` from the current one
///
/// ```text
/// Nu op Radio 2:
/// #1: Queen - Bohemian Rhapsody (1975)
///
/// 💡 <first fun fact>
/// ```
pub fn format_message(song: &ResolvedSong, offset: u32) -> String {
    let entry = &song.entry;
    let header = if offset == 0 {
        "Nu op Radio 2:"
    } else {
        "Binnenkort op Radio 2:"
    };

    let mut message = format!(
        "{}\n#{}: {} - {}",
        header, entry.position, entry.artist, entry.title
    );
    if let Some(year) = entry.year {
        message.push_str(&format!(" ({})", year));
    }
    if let Some(fact) = entry.fun_facts.first() {
        message.push_str(&format!("\n\n💡 {}", fact));
    }
    message
}

/// Destination for outbound messages
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> TrackerResult<()>;
}

/// Writes messages to the log
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, message: &OutboundMessage) -> TrackerResult<()> {
        let route = match &message.target {
            NotificationTarget::Persistent => "persistent_notification.create".to_string(),
            NotificationTarget::Service { domain, service } => format!("{}.{}", domain, service),
        };
        info!(
            target_id = %message.target_id,
            route = %route,
            position = message.position,
            rule_id = %message.rule_id,
            "{}: {}",
            message.title,
            message.message.replace('\n', " | ")
        );
        Ok(())
    }
}

/// Publishes `NotificationIssued` on the event bus
pub struct EventBusSink {
    event_bus: EventBus,
}

impl EventBusSink {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl NotificationSink for EventBusSink {
    async fn deliver(&self, message: &OutboundMessage) -> TrackerResult<()> {
        self.event_bus.emit_lossy(TrackerEvent::NotificationIssued {
            entry_id: message.entry_id.0,
            position: message.position,
            rule_id: message.rule_id.0,
            offset: message.offset,
            target: message.target_id.clone(),
            message: message.message.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

/// Delivers to several sinks; one failing sink does not stop the others
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn deliver(&self, message: &OutboundMessage) -> TrackerResult<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(message).await {
                warn!(target_id = %message.target_id, error = %e, "Notification sink failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartEntry, ChartEntryId, RuleId, Trend};

    fn song(entry: ChartEntry) -> ResolvedSong {
        ResolvedSong {
            entry: Arc::new(entry),
            match_confidence: 1.0,
            cover_art_url: None,
            trend: Trend::unknown(),
            trend_label: None,
            history: Vec::new(),
            occurrence_epoch: 1,
            source_tier: None,
        }
    }

    #[test]
    fn test_current_message_with_year_and_fact() {
        let entry = ChartEntry::new(1, 1, "Queen", "Bohemian Rhapsody")
            .with_year(1975)
            .with_fun_facts(["Recorded at six studios", "Second fact"]);

        assert_eq!(
            format_message(&song(entry), 0),
            "Nu op Radio 2:\n#1: Queen - Bohemian Rhapsody (1975)\n\n💡 Recorded at six studios"
        );
    }

    #[test]
    fn test_upcoming_message_without_extras() {
        let entry = ChartEntry::new(2, 2, "Eagles", "Hotel California");
        assert_eq!(
            format_message(&song(entry), 1),
            "Binnenkort op Radio 2:\n#2: Eagles - Hotel California"
        );
    }

    #[tokio::test]
    async fn test_event_bus_sink_emits_notification_issued() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let sink = EventBusSink::new(bus);

        let message = OutboundMessage {
            target_id: "mobile_app_iphone".to_string(),
            target: NotificationTarget::parse("mobile_app_iphone"),
            title: NOTIFICATION_TITLE.to_string(),
            message: "Nu op Radio 2:\n#1: Queen - Bohemian Rhapsody".to_string(),
            image_url: None,
            rule_id: RuleId(4),
            entry_id: ChartEntryId(1),
            position: 1,
            offset: 0,
        };
        sink.deliver(&message).await.unwrap();

        match rx.recv().await.unwrap() {
            TrackerEvent::NotificationIssued { rule_id, target, .. } => {
                assert_eq!(rule_id, 4);
                assert_eq!(target, "mobile_app_iphone");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
