//! Chart store
//!
//! Read-only lookup over the chart entries of one edition. Entries are kept
//! in id order together with their normalized artist/title so the matcher can
//! iterate candidates without re-normalizing on every poll.

use crate::matcher::normalize;
use crate::models::{ChartEntry, ChartEntryId};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use t2k_common::config::BroadcastOrder;
use t2k_common::{Error, Result};
use tracing::{info, warn};

/// Number of songs in a complete chart
pub const CHART_SIZE: usize = 2000;

/// A chart entry with its precomputed match keys
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entry: &'a Arc<ChartEntry>,
    pub artist: &'a str,
    pub title: &'a str,
}

#[derive(Debug)]
struct Indexed {
    entry: Arc<ChartEntry>,
    artist: String,
    title: String,
}

/// Immutable chart of one edition
#[derive(Debug)]
pub struct ChartStore {
    /// Sorted by entry id
    entries: Vec<Indexed>,
    by_id: HashMap<ChartEntryId, usize>,
    by_position: BTreeMap<u32, usize>,
    edition_year: i32,
}

impl ChartStore {
    /// Build a store, rejecting duplicate ids or positions
    pub fn new(entries: Vec<ChartEntry>, edition_year: i32) -> Result<Self> {
        let mut entries = entries;
        entries.sort_by_key(|entry| entry.id);

        let mut indexed = Vec::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_position = BTreeMap::new();

        for (index, entry) in entries.into_iter().enumerate() {
            if by_id.insert(entry.id, index).is_some() {
                return Err(Error::InvalidInput(format!(
                    "duplicate chart entry id {}",
                    entry.id
                )));
            }
            if by_position.insert(entry.position, index).is_some() {
                return Err(Error::InvalidInput(format!(
                    "duplicate chart position {}",
                    entry.position
                )));
            }
            indexed.push(Indexed {
                artist: normalize(&entry.artist),
                title: normalize(&entry.title),
                entry: Arc::new(entry),
            });
        }

        if indexed.len() != CHART_SIZE {
            warn!(
                entries = indexed.len(),
                expected = CHART_SIZE,
                "Chart is incomplete"
            );
        }

        Ok(Self {
            entries: indexed,
            by_id,
            by_position,
            edition_year,
        })
    }

    /// Load a JSON seed file
    ///
    /// The file is either a bare array of entries or an object with an
    /// `entries` array. Entries without an `id` use their position.
    pub fn from_json_file(path: &Path, edition_year: i32) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&content, edition_year)?;
        info!(
            path = %path.display(),
            entries = store.len(),
            "Chart loaded from JSON seed"
        );
        Ok(store)
    }

    pub fn from_json_str(content: &str, edition_year: i32) -> Result<Self> {
        let seed: SeedFile = serde_json::from_str(content)
            .map_err(|e| Error::InvalidInput(format!("Parse chart seed failed: {}", e)))?;
        let entries = match seed {
            SeedFile::Bare(entries) => entries,
            SeedFile::Wrapped { entries } => entries,
        };
        Self::new(entries.into_iter().map(SeedEntry::into_entry).collect(), edition_year)
    }

    pub fn edition_year(&self) -> i32 {
        self.edition_year
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ChartEntryId) -> Option<&Arc<ChartEntry>> {
        self.by_id.get(&id).map(|&index| &self.entries[index].entry)
    }

    pub fn by_position(&self, position: u32) -> Option<&Arc<ChartEntry>> {
        self.by_position
            .get(&position)
            .map(|&index| &self.entries[index].entry)
    }

    /// All entries in id order
    pub fn entries(&self) -> impl Iterator<Item = &Arc<ChartEntry>> {
        self.entries.iter().map(|indexed| &indexed.entry)
    }

    /// All entries with their normalized match keys, in id order
    pub fn candidates(&self) -> impl Iterator<Item = Candidate<'_>> {
        self.entries.iter().map(|indexed| Candidate {
            entry: &indexed.entry,
            artist: &indexed.artist,
            title: &indexed.title,
        })
    }

    /// Entries broadcast after `position`, nearest first
    ///
    /// `Ascending` returns positions strictly greater than `position`;
    /// `Countdown` returns positions strictly smaller.
    pub fn upcoming(
        &self,
        position: u32,
        count: usize,
        order: BroadcastOrder,
    ) -> Vec<Arc<ChartEntry>> {
        let indices: Vec<usize> = match order {
            BroadcastOrder::Ascending => self
                .by_position
                .range((Bound::Excluded(position), Bound::Unbounded))
                .take(count)
                .map(|(_, &index)| index)
                .collect(),
            BroadcastOrder::Countdown => self
                .by_position
                .range(..position)
                .rev()
                .take(count)
                .map(|(_, &index)| index)
                .collect(),
        };

        indices
            .into_iter()
            .map(|index| Arc::clone(&self.entries[index].entry))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Bare(Vec<SeedEntry>),
    Wrapped { entries: Vec<SeedEntry> },
}

#[derive(Deserialize)]
struct SeedEntry {
    #[serde(default)]
    id: Option<i64>,
    position: u32,
    artist: String,
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    fun_facts: Vec<String>,
    #[serde(default)]
    history: Vec<SeedHistory>,
}

#[derive(Deserialize)]
struct SeedHistory {
    year: i32,
    position: u32,
}

impl SeedEntry {
    fn into_entry(self) -> ChartEntry {
        let mut entry = ChartEntry::new(
            self.id.unwrap_or(i64::from(self.position)),
            self.position,
            self.artist,
            self.title,
        )
        .with_fun_facts(self.fun_facts)
        .with_history(self.history.into_iter().map(|h| (h.year, h.position)));
        entry.year = self.year;
        entry
    }
}
