//! Fuzzy matcher
//!
//! Reconciles free-text airings against the chart. Both sides are normalized
//! (case-folded, diacritics and punctuation stripped, whitespace collapsed)
//! before scoring.
//!
//! # Scoring
//!
//! Per field: `0.6 * token_set_ratio + 0.4 * normalized_levenshtein`.
//! Combined: `0.6 * title + 0.4 * artist`.
//!
//! Scores within `tie_epsilon` of the best are broken by the entry's position
//! in its most recent chart year (lower wins), then by entry id, so the result
//! is a pure function of its inputs.

use crate::chart::ChartStore;
use crate::models::{ChartEntry, RawAiring};
use std::collections::BTreeSet;
use std::sync::Arc;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const TITLE_WEIGHT: f64 = 0.6;
const ARTIST_WEIGHT: f64 = 0.4;
const TOKEN_SET_WEIGHT: f64 = 0.6;
const EDIT_WEIGHT: f64 = 0.4;

/// Acceptance policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// Minimum combined similarity for a match to be accepted
    pub threshold: f64,
    /// Scores closer than this to the best are treated as ties
    pub tie_epsilon: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            tie_epsilon: 0.02,
        }
    }
}

/// Outcome of one match attempt
///
/// `entry` is `None` when no candidate cleared the threshold; `confidence` then
/// holds the best score seen (0.0 for empty input).
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub entry: Option<Arc<ChartEntry>>,
    pub confidence: f64,
}

impl MatchResult {
    fn unresolved(best_score: f64) -> Self {
        Self {
            entry: None,
            confidence: best_score.clamp(0.0, 1.0),
        }
    }
}

/// Normalize text for comparison
///
/// Case-folds, decomposes (NFKD) and drops combining marks, replaces anything
/// that is not a letter or digit with a space and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-set similarity in [0, 1]
///
/// Compares the shared tokens against each side's full token set, so word
/// order and duplicated words do not matter.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared = join_tokens(tokens_a.intersection(&tokens_b));
    let only_a = join_tokens(tokens_a.difference(&tokens_b));
    let only_b = join_tokens(tokens_b.difference(&tokens_a));

    let with_a = join_parts(&shared, &only_a);
    let with_b = join_parts(&shared, &only_b);

    let mut best = strsim::normalized_levenshtein(&with_a, &with_b);
    if !shared.is_empty() {
        best = best
            .max(strsim::normalized_levenshtein(&shared, &with_a))
            .max(strsim::normalized_levenshtein(&shared, &with_b));
    }
    best
}

fn join_tokens<'a>(tokens: impl Iterator<Item = &'a &'a str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn join_parts(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{} {}", left, right),
    }
}

/// Similarity of two already-normalized fields
pub fn field_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    TOKEN_SET_WEIGHT * token_set_ratio(a, b) + EDIT_WEIGHT * strsim::normalized_levenshtein(a, b)
}

/// Combined similarity of normalized artist/title pairs
pub fn combined_similarity(
    raw_artist: &str,
    raw_title: &str,
    artist: &str,
    title: &str,
) -> f64 {
    let score = TITLE_WEIGHT * field_similarity(raw_title, title)
        + ARTIST_WEIGHT * field_similarity(raw_artist, artist);
    score.clamp(0.0, 1.0)
}

/// Tie-break key: position in the most recent chart year, then id
fn recency_key(entry: &ChartEntry) -> (u32, i64) {
    let position = entry
        .most_recent()
        .map(|record| record.position)
        .unwrap_or(u32::MAX);
    (position, entry.id.0)
}

/// Deterministic fuzzy matcher
#[derive(Debug, Clone, Default)]
pub struct FuzzyMatcher {
    config: MatchConfig,
}

impl FuzzyMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Match an airing against the chart
    ///
    /// # Returns
    /// The accepted entry and its confidence, or `None` with the best score
    /// when nothing clears the threshold.
    pub fn match_airing(&self, raw: &RawAiring, chart: &ChartStore) -> MatchResult {
        let raw_artist = normalize(&raw.artist_text);
        let raw_title = normalize(&raw.title_text);
        if raw_artist.is_empty() && raw_title.is_empty() {
            return MatchResult::unresolved(0.0);
        }

        // Exact fast path
        let exact = chart
            .candidates()
            .filter(|c| c.artist == raw_artist && c.title == raw_title)
            .map(|c| c.entry)
            .min_by_key(|entry| recency_key(entry));
        if let Some(entry) = exact {
            return MatchResult {
                entry: Some(Arc::clone(entry)),
                confidence: 1.0,
            };
        }

        // Candidates come in id order, so the scored list is deterministic
        let scored: Vec<(f64, &Arc<ChartEntry>)> = chart
            .candidates()
            .map(|c| {
                (
                    combined_similarity(&raw_artist, &raw_title, &c.artist, &c.title),
                    c.entry,
                )
            })
            .collect();

        let best = scored.iter().map(|(score, _)| *score).fold(0.0_f64, f64::max);
        if scored.is_empty() || best < self.config.threshold {
            tracing::debug!(
                artist = %raw.artist_text,
                title = %raw.title_text,
                best_score = best,
                "No chart entry above threshold"
            );
            return MatchResult::unresolved(best);
        }

        let floor = (best - self.config.tie_epsilon).max(self.config.threshold);
        let chosen = scored
            .iter()
            .filter(|(score, _)| *score >= floor)
            .min_by_key(|(_, entry)| recency_key(entry));

        match chosen {
            Some((score, entry)) => MatchResult {
                entry: Some(Arc::clone(entry)),
                confidence: score.clamp(0.0, 1.0),
            },
            None => MatchResult::unresolved(best),
        }
    }
}
