//! DeletesMap
//!
//! Side effect of `upsert`, `erase`, and compaction: for each segment, the row
//! offsets whose rows are no longer the current version of their key. The map
//! is handed to the owner of the per-segment delete vectors and is never
//! persisted by itself.

use std::collections::hash_map::{self, HashMap};

use crate::location::RowLocation;

/// Segment id → superseded row offsets, in the order they were superseded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletesMap {
    segments: HashMap<u32, Vec<u32>>,
}

impl DeletesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the row at `location` is obsolete
    pub fn add(&mut self, location: RowLocation) {
        self.segments
            .entry(location.segment_id)
            .or_default()
            .push(location.row_id);
    }

    /// Row offsets recorded for one segment
    pub fn get(&self, segment_id: u32) -> Option<&[u32]> {
        self.segments.get(&segment_id).map(|rows| rows.as_slice())
    }

    /// Number of segments with at least one deleted row
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Total number of row offsets across all segments
    pub fn num_rows(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append every entry of `other` into this map
    pub fn merge(&mut self, other: DeletesMap) {
        for (segment_id, rows) in other.segments {
            self.segments.entry(segment_id).or_default().extend(rows);
        }
    }

    pub fn iter(&self) -> hash_map::Iter<'_, u32, Vec<u32>> {
        self.segments.iter()
    }

    /// Entries sorted by segment id, for deterministic consumers
    pub fn sorted(&self) -> Vec<(u32, &[u32])> {
        let mut entries: Vec<_> = self
            .segments
            .iter()
            .map(|(&segment_id, rows)| (segment_id, rows.as_slice()))
            .collect();
        entries.sort_unstable_by_key(|(segment_id, _)| *segment_id);
        entries
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn into_inner(self) -> HashMap<u32, Vec<u32>> {
        self.segments
    }
}

impl From<HashMap<u32, Vec<u32>>> for DeletesMap {
    fn from(segments: HashMap<u32, Vec<u32>>) -> Self {
        Self { segments }
    }
}

impl<'a> IntoIterator for &'a DeletesMap {
    type Item = (&'a u32, &'a Vec<u32>);
    type IntoIter = hash_map::Iter<'a, u32, Vec<u32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
