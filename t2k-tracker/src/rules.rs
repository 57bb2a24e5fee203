//! Notification rule engine
//!
//! Runs only on song changes. Candidates are the current song (when
//! `notify_current`) and the upcoming songs at the configured 1-based offsets
//! (when `notify_upcoming`). Every enabled rule that matches a candidate
//! yields one message per target, unless the same rule already fired for the
//! same occurrence of that entry during this session.

use crate::models::{
    CoordinatorState, DedupeKey, NotificationRule, NotificationSettings, NotificationTarget,
    OutboundMessage, ResolvedSong, RuleId,
};
use crate::notify::{format_message, NOTIFICATION_TITLE};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Rules keyed by id, iterated in id order
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: BTreeMap<RuleId, NotificationRule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the rule with the same id
    pub fn insert(&mut self, rule: NotificationRule) -> Option<NotificationRule> {
        self.rules.insert(rule.id, rule)
    }

    pub fn remove(&mut self, id: RuleId) -> Option<NotificationRule> {
        self.rules.remove(&id)
    }

    pub fn get(&self, id: RuleId) -> Option<&NotificationRule> {
        self.rules.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<NotificationRule> for RuleBook {
    fn from_iter<I: IntoIterator<Item = NotificationRule>>(iter: I) -> Self {
        let mut book = RuleBook::new();
        for rule in iter {
            book.insert(rule);
        }
        book
    }
}

/// Rule evaluation with session-scoped dedupe
#[derive(Debug, Default)]
pub struct RuleEngine {
    fired: HashSet<DedupeKey>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct rule firings recorded this session
    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    /// Messages due for `state`, recording every firing
    ///
    /// Calling this again for the same state produces nothing.
    pub fn evaluate(
        &mut self,
        state: &CoordinatorState,
        rules: &RuleBook,
        settings: &NotificationSettings,
    ) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        if settings.targets.is_empty() {
            return messages;
        }

        for (offset, song) in candidates(state, settings) {
            for rule in rules.iter().filter(|rule| rule.enabled) {
                if !rule.matches(&song.entry.artist, &song.entry.title) {
                    continue;
                }

                let key = DedupeKey {
                    rule_id: rule.id,
                    entry_id: song.entry.id,
                    occurrence_epoch: song.occurrence_epoch,
                };
                if !self.fired.insert(key) {
                    debug!(rule_id = %rule.id, entry_id = %song.entry.id, "Rule already fired for this occurrence");
                    continue;
                }

                let body = format_message(song, offset);
                for target_id in &settings.targets {
                    messages.push(OutboundMessage {
                        target_id: target_id.clone(),
                        target: NotificationTarget::parse(target_id),
                        title: NOTIFICATION_TITLE.to_string(),
                        message: body.clone(),
                        image_url: song.cover_art_url.clone(),
                        rule_id: rule.id,
                        entry_id: song.entry.id,
                        position: song.entry.position,
                        offset,
                    });
                }
            }
        }

        messages
    }
}

/// `(offset, song)` pairs to check; offset 0 is the current song
fn candidates<'a>(
    state: &'a CoordinatorState,
    settings: &NotificationSettings,
) -> Vec<(u32, &'a ResolvedSong)> {
    let mut candidates = Vec::new();
    let Some(current) = state.current.as_ref() else {
        return candidates;
    };

    if settings.notify_current {
        candidates.push((0, current));
    }
    if settings.notify_upcoming {
        for (index, song) in state.upcoming.iter().enumerate() {
            let offset = index as u32 + 1;
            if settings.upcoming_positions.contains(&offset) {
                candidates.push((offset, song));
            }
        }
    }
    candidates
}
