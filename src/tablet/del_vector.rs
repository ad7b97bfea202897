//! Delete vectors
//!
//! The set of deleted row offsets of one segment, tagged with the tablet
//! version at which it was last changed.

use bytes::{Buf, BufMut};

use crate::error::{IndexError, Result};

/// Version (8) + row count (4)
const ENCODED_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelVector {
    version: i64,
    /// Sorted, without duplicates
    rows: Vec<u32>,
}

impl DelVector {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            rows: Vec::new(),
        }
    }

    /// Build from any row offsets; duplicates are collapsed
    pub fn from_rows(version: i64, mut rows: Vec<u32>) -> Self {
        rows.sort_unstable();
        rows.dedup();
        Self { version, rows }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Mark rows deleted; returns how many were not deleted before
    pub fn add_dels(&mut self, rows: &[u32]) -> usize {
        let before = self.rows.len();
        self.rows.extend_from_slice(rows);
        self.rows.sort_unstable();
        self.rows.dedup();
        self.rows.len() - before
    }

    pub fn contains(&self, row: u32) -> bool {
        self.rows.binary_search(&row).is_ok()
    }

    /// Number of deleted rows
    pub fn cardinality(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Append `[version i64][count u32][row u32 ...]`, little-endian
    pub(crate) fn encode_to(&self, buf: &mut impl BufMut) -> Result<()> {
        let count = u32::try_from(self.rows.len()).map_err(|_| {
            IndexError::Serialization(format!(
                "delete vector has {} rows, more than a segment can hold",
                self.rows.len()
            ))
        })?;
        buf.put_i64_le(self.version);
        buf.put_u32_le(count);
        for &row in &self.rows {
            buf.put_u32_le(row);
        }
        Ok(())
    }

    pub(crate) fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        if buf.remaining() < ENCODED_HEADER_SIZE {
            return Err(IndexError::DataCorruption(
                "truncated delete vector header".to_string(),
            ));
        }
        let version = buf.get_i64_le();
        let count = buf.get_u32_le() as usize;

        if buf.remaining() / 4 < count {
            return Err(IndexError::DataCorruption(format!(
                "delete vector declares {} rows, only {} bytes remain",
                count,
                buf.remaining()
            )));
        }

        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let row = buf.get_u32_le();
            if rows.last().is_some_and(|&prev| prev >= row) {
                return Err(IndexError::DataCorruption(format!(
                    "delete vector rows out of order at {}",
                    row
                )));
            }
            rows.push(row);
        }

        Ok(Self { version, rows })
    }
}
