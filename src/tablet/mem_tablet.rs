//! In-memory tablet
//!
//! Keeps committed key rows and delete vectors in memory. Stands in for the
//! segment store when embedding the index without on-disk segments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::deletes::DeletesMap;
use crate::error::{IndexError, Result};
use crate::key::KeyValue;
use crate::snapshot::{SnapshotMeta, SnapshotType, CURRENT_FORMAT_VERSION};

use super::{DelVector, RowsetMeta, TabletMeta, TabletReader};

/// Rows of one segment: each row is its key column values
pub type SegmentRows = Vec<Vec<KeyValue>>;

/// In-memory tablet
///
/// ## Concurrency:
/// - All mutable state sits behind one RwLock
/// - `rowsets()` calls are counted so callers can observe index scans
pub struct MemTablet {
    meta: RwLock<TabletMeta>,
    state: RwLock<TabletState>,
    rowset_scans: AtomicUsize,
}

#[derive(Default)]
struct TabletState {
    rowsets: Vec<RowsetMeta>,
    segments: HashMap<u32, SegmentRows>,
    delete_vectors: HashMap<u32, DelVector>,
    next_rowset_id: u64,
    version: i64,
    meta_unreadable: bool,
}

impl MemTablet {
    pub fn new(meta: TabletMeta) -> Self {
        Self {
            meta: RwLock::new(meta),
            state: RwLock::new(TabletState::default()),
            rowset_scans: AtomicUsize::new(0),
        }
    }

    pub fn meta(&self) -> TabletMeta {
        self.meta.read().clone()
    }

    /// Current tablet version; every commit and delete application bumps it
    pub fn version(&self) -> i64 {
        self.state.read().version
    }

    /// Commit a rowset made of the given segments; returns its metadata
    pub fn commit_rowset(&self, segments: Vec<SegmentRows>) -> Result<RowsetMeta> {
        let mut meta = self.meta.write();
        let mut state = self.state.write();
        commit_locked(&mut meta, &mut state, segments)
    }

    /// Replace `inputs` by a compacted rowset; returns its metadata.
    ///
    /// The output rowset takes the position of the first input in commit order.
    /// Inputs are checked and swapped under one lock, so of two compactions
    /// racing over the same inputs only the first commits.
    pub fn commit_compaction(
        &self,
        inputs: &[u64],
        segments: Vec<SegmentRows>,
    ) -> Result<RowsetMeta> {
        let mut meta = self.meta.write();
        let mut state = self.state.write();

        let committed = |id: &u64| state.rowsets.iter().any(|r| r.rowset_id == *id);
        if inputs.is_empty() || !inputs.iter().all(committed) {
            return Err(IndexError::InvalidArgument(format!(
                "compaction inputs {:?} are not committed rowsets",
                inputs
            )));
        }

        let output = commit_locked(&mut meta, &mut state, segments)?;

        let first_input = state
            .rowsets
            .iter()
            .position(|r| inputs.contains(&r.rowset_id))
            .unwrap_or(0);

        let removed: Vec<RowsetMeta> = state
            .rowsets
            .iter()
            .filter(|r| inputs.contains(&r.rowset_id))
            .cloned()
            .collect();
        state
            .rowsets
            .retain(|r| !inputs.contains(&r.rowset_id) && r.rowset_id != output.rowset_id);
        state.rowsets.insert(first_input, output.clone());

        for rowset in &removed {
            for segment_id in rowset.segment_ids() {
                state.segments.remove(&segment_id);
                state.delete_vectors.remove(&segment_id);
            }
        }

        debug!(
            tablet_id = meta.tablet_id,
            inputs = ?inputs,
            output = output.rowset_id,
            "compaction committed"
        );
        Ok(output)
    }

    /// Merge the output of an index write into the delete vectors
    pub fn apply_deletes(&self, deletes: &DeletesMap) -> usize {
        let mut state = self.state.write();
        state.version += 1;
        let version = state.version;

        let mut newly_deleted = 0;
        for (&segment_id, rows) in deletes {
            let dv = state
                .delete_vectors
                .entry(segment_id)
                .or_insert_with(|| DelVector::new(version));
            newly_deleted += dv.add_dels(rows);
            dv.set_version(version);
        }
        newly_deleted
    }

    /// Capture rowset metadata and delete vectors into a snapshot
    pub fn snapshot(&self, snapshot_type: SnapshotType) -> SnapshotMeta {
        let meta = self.meta.read();
        let state = self.state.read();

        let mut snapshot = SnapshotMeta::new();
        snapshot.set_snapshot_type(snapshot_type);
        snapshot.set_snapshot_format(CURRENT_FORMAT_VERSION);
        snapshot.set_snapshot_version(state.version);
        snapshot.set_tablet_meta(meta.clone());
        *snapshot.rowset_metas_mut() = state.rowsets.clone();
        *snapshot.delete_vectors_mut() = state.delete_vectors.clone();
        snapshot
    }

    /// Number of times `rowsets()` has been called
    pub fn rowset_scans(&self) -> usize {
        self.rowset_scans.load(Ordering::SeqCst)
    }

    /// Make `rowsets()` fail, as if the rowset metadata could not be read
    pub fn set_meta_unreadable(&self, unreadable: bool) {
        self.state.write().meta_unreadable = unreadable;
    }
}

fn commit_locked(
    meta: &mut TabletMeta,
    state: &mut TabletState,
    segments: Vec<SegmentRows>,
) -> Result<RowsetMeta> {
    let num_segments = u32::try_from(segments.len())
        .map_err(|_| IndexError::InvalidArgument("too many segments".to_string()))?;
    let first = meta.next_rowset_seg_id;
    let next = first.checked_add(num_segments).ok_or_else(|| {
        IndexError::InvalidArgument("segment id space exhausted".to_string())
    })?;

    state.version += 1;
    let rowset = RowsetMeta {
        rowset_id: state.next_rowset_id,
        rowset_seg_id: first,
        num_segments,
        num_rows: segments.iter().map(|s| s.len() as u64).sum(),
        data_disk_size: 0,
        start_version: state.version,
        end_version: state.version,
        creation_time: meta.creation_time,
    };

    for (segment_id, rows) in rowset.segment_ids().zip(segments) {
        state.segments.insert(segment_id, rows);
    }
    state.next_rowset_id += 1;
    state.rowsets.push(rowset.clone());
    meta.next_rowset_seg_id = next;

    debug!(
        tablet_id = meta.tablet_id,
        rowset_id = rowset.rowset_id,
        segments = num_segments,
        rows = rowset.num_rows,
        "rowset committed"
    );
    Ok(rowset)
}

impl TabletReader for MemTablet {
    fn tablet_id(&self) -> i64 {
        self.meta.read().tablet_id
    }

    fn rowsets(&self) -> Result<Vec<RowsetMeta>> {
        self.rowset_scans.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if state.meta_unreadable {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "rowset metadata unreadable",
            )));
        }
        Ok(state.rowsets.clone())
    }

    fn segment_keys(&self, rowset: &RowsetMeta, segment_index: u32) -> Result<Vec<Vec<KeyValue>>> {
        let segment_id = rowset.segment_id(segment_index).ok_or_else(|| {
            IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "segment index {} out of range for rowset {}",
                    segment_index, rowset.rowset_id
                ),
            ))
        })?;
        self.state
            .read()
            .segments
            .get(&segment_id)
            .cloned()
            .ok_or_else(|| {
                IndexError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("segment {} not found", segment_id),
                ))
            })
    }

    fn delete_vector(&self, segment_id: u32) -> Result<Option<DelVector>> {
        Ok(self.state.read().delete_vectors.get(&segment_id).cloned())
    }
}
