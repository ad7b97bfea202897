//! Tablet Module
//!
//! Metadata records and the collaborator interface the primary index loads
//! from.
//!
//! ## Responsibilities
//! - Describe a tablet and its committed rowsets (`TabletMeta`, `RowsetMeta`)
//! - Hold per-segment delete vectors (`DelVector`)
//! - Expose committed keys to `PrimaryIndex::load` (`TabletReader`)
//! - Provide an in-memory tablet for embedding and tests (`MemTablet`)
//!
//! ## Segment Ids
//! Segment ids are unique within a tablet. A rowset owns the contiguous range
//! `rowset_seg_id .. rowset_seg_id + num_segments`.

mod del_vector;
mod mem_tablet;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::{KeySchema, KeyValue};

pub use del_vector::DelVector;
pub use mem_tablet::MemTablet;

/// Descriptive metadata of one tablet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletMeta {
    pub tablet_id: i64,
    pub schema_hash: i32,
    pub key_schema: KeySchema,
    /// Unix seconds
    pub creation_time: i64,
    /// First segment id not yet assigned to a rowset
    pub next_rowset_seg_id: u32,
}

impl TabletMeta {
    pub fn new(tablet_id: i64, schema_hash: i32, key_schema: KeySchema) -> Self {
        Self {
            tablet_id,
            schema_hash,
            key_schema,
            creation_time: 0,
            next_rowset_seg_id: 0,
        }
    }
}

/// Metadata of one committed rowset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsetMeta {
    pub rowset_id: u64,
    /// Segment id of the first segment in this rowset
    pub rowset_seg_id: u32,
    pub num_segments: u32,
    pub num_rows: u64,
    pub data_disk_size: u64,
    pub start_version: i64,
    pub end_version: i64,
    /// Unix seconds
    pub creation_time: i64,
}

impl RowsetMeta {
    /// Segment id of the segment at `index`, or None if it is past the end
    /// of this rowset or of the segment id space
    pub fn segment_id(&self, index: u32) -> Option<u32> {
        if index >= self.num_segments {
            return None;
        }
        self.rowset_seg_id.checked_add(index)
    }

    /// Whether `rowset_seg_id + num_segments` fits the segment id space
    pub fn has_valid_segment_range(&self) -> bool {
        self.rowset_seg_id.checked_add(self.num_segments).is_some()
    }

    /// Segment ids of this rowset; clipped at `u32::MAX` when the range is
    /// invalid
    pub fn segment_ids(&self) -> Range<u32> {
        self.rowset_seg_id..self.rowset_seg_id.saturating_add(self.num_segments)
    }
}

/// Read access to a tablet's committed data, as needed to build its index
pub trait TabletReader {
    fn tablet_id(&self) -> i64;

    /// Committed rowsets in commit order
    fn rowsets(&self) -> Result<Vec<RowsetMeta>>;

    /// Key columns of every row in one segment, in row offset order
    fn segment_keys(&self, rowset: &RowsetMeta, segment_index: u32) -> Result<Vec<Vec<KeyValue>>>;

    /// Delete vector of a segment, if any row of it has been deleted
    fn delete_vector(&self, segment_id: u32) -> Result<Option<DelVector>>;
}
