//! Trend engine
//!
//! Year-over-year movement of a chart entry. The "current" year is the
//! edition being broadcast; the comparison year is the newest history record
//! strictly before it, wherever that falls (gaps in the history are allowed).

use crate::models::{ChartEntry, PositionRecord, Trend};

#[derive(Debug, Clone, Copy)]
pub struct TrendEngine {
    edition_year: i32,
    history_limit: usize,
}

impl TrendEngine {
    pub fn new(edition_year: i32, history_limit: usize) -> Self {
        Self {
            edition_year,
            history_limit,
        }
    }

    pub fn edition_year(&self) -> i32 {
        self.edition_year
    }

    /// Trend of `entry` in the configured edition
    ///
    /// The current position is the history record for the edition year when
    /// present, otherwise the entry's chart position.
    pub fn compute(&self, entry: &ChartEntry) -> Trend {
        let current = entry
            .position_in(self.edition_year)
            .unwrap_or(entry.position);

        match entry.latest_before(self.edition_year) {
            Some(previous) => Trend::from_delta(previous.position as i32 - current as i32),
            None => Trend::unknown(),
        }
    }

    /// Prior editions for display, newest first
    pub fn history(&self, entry: &ChartEntry) -> Vec<PositionRecord> {
        entry
            .position_history
            .iter()
            .rev()
            .filter(|record| record.year < self.edition_year)
            .take(self.history_limit)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendDirection;

    fn entry(history: &[(i32, u32)]) -> ChartEntry {
        ChartEntry::new(1, 2, "Artist", "Title").with_history(history.iter().copied())
    }

    #[test]
    fn test_climb_is_up_with_positive_delta() {
        let trend = TrendEngine::new(2025, 5).compute(&entry(&[(2024, 5), (2025, 2)]));
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.delta, 3);
    }

    #[test]
    fn test_drop_is_down_with_negative_delta() {
        let trend = TrendEngine::new(2025, 5).compute(&entry(&[(2024, 2), (2025, 5)]));
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_eq!(trend.delta, -3);
    }

    #[test]
    fn test_equal_positions_are_same() {
        let trend = TrendEngine::new(2025, 5).compute(&entry(&[(2024, 7), (2025, 7)]));
        assert_eq!(trend.direction, TrendDirection::Same);
        assert_eq!(trend.delta, 0);
    }

    #[test]
    fn test_no_prior_year_is_unknown() {
        let trend = TrendEngine::new(2025, 5).compute(&entry(&[(2025, 7)]));
        assert_eq!(trend.direction, TrendDirection::Unknown);

        let trend = TrendEngine::new(2025, 5).compute(&entry(&[]));
        assert_eq!(trend.direction, TrendDirection::Unknown);
    }

    #[test]
    fn test_gap_uses_nearest_prior_year() {
        // Absent in 2023
        let trend = TrendEngine::new(2024, 5).compute(&entry(&[(2022, 10), (2024, 4)]));
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.delta, 6);
    }

    #[test]
    fn test_missing_edition_record_falls_back_to_chart_position() {
        // Chart position is 2
        let trend = TrendEngine::new(2025, 5).compute(&entry(&[(2024, 9)]));
        assert_eq!(trend.delta, 7);
    }

    #[test]
    fn test_history_newest_first_and_limited() {
        let engine = TrendEngine::new(2025, 2);
        let history = engine.history(&entry(&[(2021, 9), (2022, 8), (2024, 6), (2025, 2)]));
        assert_eq!(
            history,
            vec![PositionRecord::new(2024, 6), PositionRecord::new(2022, 8)]
        );
    }
}
