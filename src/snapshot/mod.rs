//! Snapshot Module
//!
//! `SnapshotMeta` bundles the durable, index-relevant state of a tablet: its
//! metadata, its committed rowsets, and every segment's delete vector. It is
//! written when a snapshot is taken (backup, clone, migration) and read back
//! to rebuild that state elsewhere.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                                │
//! │   Magic: "PKSN" (4) | Stream version: u16 (2)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Fields                                                          │
//! │   SnapshotType: u8 | FormatVersion: i32 | SnapshotVersion: i64  │
//! │   TabletMeta:  [Len: u32][bincode]                              │
//! │   Rowsets:     [Count: u32] then [Len: u32][bincode] each       │
//! │   DelVectors:  [Count: u32] then per entry                      │
//! │                [SegmentId: u32][Version: i64][N: u32][N x u32]  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                                │
//! │   CRC32 of header and fields                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//! All integers are little-endian. Delete vectors are written in ascending
//! segment id order.

mod reader;
mod writer;

use std::collections::HashMap;

use crate::error::{IndexError, Result};
use crate::tablet::{DelVector, RowsetMeta, TabletMeta};

// =============================================================================
// Shared Constants (used by writer and reader)
// =============================================================================

/// Magic bytes identifying a snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"PKSN";

/// Version of the stream framing described above
pub(crate) const STREAM_VERSION: u16 = 1;

/// Magic (4) + stream version (2)
pub(crate) const HEADER_SIZE: usize = 6;

/// CRC32 (4)
pub(crate) const FOOTER_SIZE: usize = 4;

/// Snapshot format version written by this crate
pub const CURRENT_FORMAT_VERSION: i32 = 1;

// =============================================================================
// Snapshot Type
// =============================================================================

/// Kind of snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotType {
    /// Not yet set; cannot be serialized
    #[default]
    Unknown,
    /// Only rowsets and delete vectors newer than a base version
    Incremental,
    /// The complete tablet state
    Full,
}

impl SnapshotType {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            SnapshotType::Unknown => 0,
            SnapshotType::Incremental => 1,
            SnapshotType::Full => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SnapshotType::Unknown),
            1 => Ok(SnapshotType::Incremental),
            2 => Ok(SnapshotType::Full),
            other => Err(IndexError::DataCorruption(format!(
                "unknown snapshot type {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Snapshot Meta
// =============================================================================

/// Serializable snapshot of a tablet's index-relevant state
///
/// Version fields start unset; a snapshot cannot be serialized until the
/// type, both versions, and the tablet metadata are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMeta {
    snapshot_type: SnapshotType,
    format_version: Option<i32>,
    snapshot_version: Option<i64>,
    tablet_meta: Option<TabletMeta>,
    rowset_metas: Vec<RowsetMeta>,
    delete_vectors: HashMap<u32, DelVector>,
}

impl SnapshotMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_type(&self) -> SnapshotType {
        self.snapshot_type
    }

    pub fn set_snapshot_type(&mut self, snapshot_type: SnapshotType) {
        self.snapshot_type = snapshot_type;
    }

    pub fn snapshot_format(&self) -> Option<i32> {
        self.format_version
    }

    pub fn set_snapshot_format(&mut self, format: i32) {
        self.format_version = Some(format);
    }

    pub fn snapshot_version(&self) -> Option<i64> {
        self.snapshot_version
    }

    pub fn set_snapshot_version(&mut self, version: i64) {
        self.snapshot_version = Some(version);
    }

    pub fn tablet_meta(&self) -> Option<&TabletMeta> {
        self.tablet_meta.as_ref()
    }

    pub fn tablet_meta_mut(&mut self) -> Option<&mut TabletMeta> {
        self.tablet_meta.as_mut()
    }

    pub fn set_tablet_meta(&mut self, meta: TabletMeta) {
        self.tablet_meta = Some(meta);
    }

    pub fn rowset_metas(&self) -> &[RowsetMeta] {
        &self.rowset_metas
    }

    pub fn rowset_metas_mut(&mut self) -> &mut Vec<RowsetMeta> {
        &mut self.rowset_metas
    }

    pub fn delete_vectors(&self) -> &HashMap<u32, DelVector> {
        &self.delete_vectors
    }

    pub fn delete_vectors_mut(&mut self) -> &mut HashMap<u32, DelVector> {
        &mut self.delete_vectors
    }
}
