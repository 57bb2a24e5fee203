//! Notification rules, settings and outbound messages

use super::ChartEntryId;
use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Target that is always available without further configuration
pub const PERSISTENT_NOTIFICATION: &str = "persistent_notification";

/// Stable rule identifier (database row id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Song field a rule matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Artist,
    Title,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Artist => "artist",
            RuleKind::Title => "title",
        }
    }
}

impl FromStr for RuleKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" => Ok(RuleKind::Artist),
            "title" => Ok(RuleKind::Title),
            other => Err(TrackerError::ConfigurationInvalid(format!(
                "unsupported rule type '{}'",
                other
            ))),
        }
    }
}

/// User-authored notification rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: RuleId,
    pub kind: RuleKind,
    /// Case-insensitive substring
    pub pattern: String,
    pub enabled: bool,
}

impl NotificationRule {
    /// Build an enabled rule; rejects empty or whitespace-only patterns
    pub fn new(id: i64, kind: RuleKind, pattern: impl Into<String>) -> TrackerResult<Self> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err(TrackerError::ConfigurationInvalid(format!(
                "rule {} has an empty pattern",
                id
            )));
        }

        Ok(Self {
            id: RuleId(id),
            kind,
            pattern,
            enabled: true,
        })
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Case-insensitive substring match against the artist or title
    pub fn matches(&self, artist: &str, title: &str) -> bool {
        let haystack = match self.kind {
            RuleKind::Artist => artist,
            RuleKind::Title => title,
        };
        haystack
            .to_lowercase()
            .contains(&self.pattern.trim().to_lowercase())
    }
}

/// Who gets notified and about which songs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub targets: BTreeSet<String>,
    pub notify_current: bool,
    pub notify_upcoming: bool,
    /// 1-based offsets from the current song
    pub upcoming_positions: BTreeSet<u32>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            targets: BTreeSet::from([PERSISTENT_NOTIFICATION.to_string()]),
            notify_current: true,
            notify_upcoming: false,
            upcoming_positions: BTreeSet::from([1, 2, 3]),
        }
    }
}

/// Identity of one rule firing for one song occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub rule_id: RuleId,
    pub entry_id: ChartEntryId,
    pub occurrence_epoch: u32,
}

/// Parsed destination for a target id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationTarget {
    /// Built-in persistent notification
    Persistent,
    /// `domain.service`; a bare id means domain `notify`
    Service { domain: String, service: String },
}

impl NotificationTarget {
    pub fn parse(target_id: &str) -> Self {
        let target_id = target_id.trim();
        if target_id == PERSISTENT_NOTIFICATION {
            return NotificationTarget::Persistent;
        }

        match target_id.split_once('.') {
            Some((domain, service)) if !domain.is_empty() && !service.is_empty() => {
                NotificationTarget::Service {
                    domain: domain.to_string(),
                    service: service.to_string(),
                }
            }
            _ => NotificationTarget::Service {
                domain: "notify".to_string(),
                service: target_id.to_string(),
            },
        }
    }
}

/// One message for one target, ready to hand to a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub target_id: String,
    pub target: NotificationTarget,
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
    pub rule_id: RuleId,
    pub entry_id: ChartEntryId,
    pub position: u32,
    /// 0 for the current song, n for the n-th upcoming song
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_match_is_case_insensitive_substring() {
        let rule = NotificationRule::new(1, RuleKind::Artist, "queen").unwrap();
        assert!(rule.matches("Queen", "Bohemian Rhapsody"));
        assert!(rule.matches("Queen & David Bowie", "Under Pressure"));
        assert!(!rule.matches("ABBA", "Queen of Hearts"));
    }

    #[test]
    fn test_title_rule_ignores_artist() {
        let rule = NotificationRule::new(2, RuleKind::Title, "Hotel").unwrap();
        assert!(rule.matches("Eagles", "Hotel California"));
        assert!(!rule.matches("Hotel Costes", "Stay"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = NotificationRule::new(3, RuleKind::Title, "   ").unwrap_err();
        assert!(matches!(err, TrackerError::ConfigurationInvalid(_)));
    }

    #[test]
    fn test_rule_kind_parse() {
        assert_eq!("Artist".parse::<RuleKind>().unwrap(), RuleKind::Artist);
        assert!("position_range".parse::<RuleKind>().is_err());
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!(
            NotificationTarget::parse("persistent_notification"),
            NotificationTarget::Persistent
        );
        assert_eq!(
            NotificationTarget::parse("mobile_app_iphone"),
            NotificationTarget::Service {
                domain: "notify".to_string(),
                service: "mobile_app_iphone".to_string()
            }
        );
        assert_eq!(
            NotificationTarget::parse("telegram.send_message"),
            NotificationTarget::Service {
                domain: "telegram".to_string(),
                service: "send_message".to_string()
            }
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = NotificationSettings::default();
        assert!(settings.targets.contains(PERSISTENT_NOTIFICATION));
        assert!(settings.notify_current);
        assert!(!settings.notify_upcoming);
        assert_eq!(
            settings.upcoming_positions.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }
}
