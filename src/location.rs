//! Row locations
//!
//! A row is addressed by the segment that stores it and its offset inside that
//! segment. The hash index stores locations packed into a single `u64`:
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────┐
//! │ segment id (high 32)     │ row offset (low 32)      │
//! └──────────────────────────┴──────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mask selecting the row offset from a packed location
pub const ROWID_MASK: u64 = 0xffff_ffff;

/// Physical position of a row: (segment id, row offset within segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowLocation {
    pub segment_id: u32,
    pub row_id: u32,
}

impl RowLocation {
    pub fn new(segment_id: u32, row_id: u32) -> Self {
        Self { segment_id, row_id }
    }

    /// Pack into the hash index value representation
    pub fn pack(&self) -> u64 {
        ((self.segment_id as u64) << 32) | self.row_id as u64
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            segment_id: (packed >> 32) as u32,
            row_id: (packed & ROWID_MASK) as u32,
        }
    }
}

impl fmt::Display for RowLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.segment_id, self.row_id)
    }
}
