//! Index writer
//!
//! The mutation half of the primary index. An `IndexWriter` is the single
//! writer token of a tablet: while it exists no other writer, load, or unload
//! can touch the index, so the operations below take no locks of their own.

use parking_lot::MappedMutexGuard;

use crate::config::InsertCheck;
use crate::deletes::DeletesMap;
use crate::error::{IndexError, Result};
use crate::key::KeySchema;
use crate::location::RowLocation;

use super::primary_index::LoadedIndex;

/// Exclusive write access to a loaded `PrimaryIndex`
///
/// Keys passed to every method are *encoded* primary keys (see
/// `crate::key::encode_key`). Within one batch, a key that appears more than
/// once ends up at the position of its last occurrence.
///
/// For fixed-width schemas, inserting or upserting a key of any other length
/// fails with `KeyEncoding` before the index is touched. Lookups, erases, and
/// replacements treat such a key as absent.
pub struct IndexWriter<'a> {
    loaded: MappedMutexGuard<'a, LoadedIndex>,
    schema: &'a KeySchema,
    insert_check: InsertCheck,
}

impl<'a> IndexWriter<'a> {
    pub(super) fn new(
        loaded: MappedMutexGuard<'a, LoadedIndex>,
        schema: &'a KeySchema,
        insert_check: InsertCheck,
    ) -> Self {
        Self {
            loaded,
            schema,
            insert_check,
        }
    }

    pub fn tablet_id(&self) -> i64 {
        self.loaded.tablet_id
    }

    pub fn schema(&self) -> &KeySchema {
        self.schema
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert keys that are known not to exist, at explicit row offsets
    ///
    /// With `InsertCheck::Trusted` an existing key is silently overwritten.
    /// With `InsertCheck::Strict` the whole batch is rejected with
    /// `DuplicateKey` and the index is left unchanged.
    pub fn insert<K: AsRef<[u8]>>(
        &mut self,
        segment_id: u32,
        row_ids: &[u32],
        keys: &[K],
    ) -> Result<()> {
        if row_ids.len() != keys.len() {
            return Err(IndexError::InvalidArgument(format!(
                "insert: {} row ids for {} keys",
                row_ids.len(),
                keys.len()
            )));
        }
        self.check_widths(keys)?;
        self.check_absent(keys)?;

        for (&row_id, key) in row_ids.iter().zip(keys) {
            self.loaded
                .index
                .upsert(key.as_ref(), RowLocation::new(segment_id, row_id));
        }
        Ok(())
    }

    /// Insert keys that are known not to exist, at consecutive row offsets
    /// starting from `row_id_start`
    pub fn insert_range<K: AsRef<[u8]>>(
        &mut self,
        segment_id: u32,
        row_id_start: u32,
        keys: &[K],
    ) -> Result<()> {
        self.check_widths(keys)?;
        self.check_absent(keys)?;

        for (i, key) in keys.iter().enumerate() {
            let location = RowLocation::new(segment_id, row_id_start.wrapping_add(i as u32));
            self.loaded.index.upsert(key.as_ref(), location);
        }
        Ok(())
    }

    fn check_widths<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<()> {
        match keys.iter().find(|key| !self.loaded.index.accepts(key.as_ref())) {
            Some(key) => Err(IndexError::KeyEncoding(format!(
                "encoded key is {} bytes, schema width is {:?}",
                key.as_ref().len(),
                self.schema.fixed_width()
            ))),
            None => Ok(()),
        }
    }

    fn check_absent<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<()> {
        if self.insert_check == InsertCheck::Strict
            && keys.iter().any(|key| self.loaded.index.contains(key.as_ref()))
        {
            return Err(IndexError::DuplicateKey);
        }
        Ok(())
    }

    // =========================================================================
    // Upsert / Erase
    // =========================================================================

    /// Point each key at its new row, recording any previous row in `deletes`
    pub fn upsert<K: AsRef<[u8]>>(
        &mut self,
        segment_id: u32,
        row_id_start: u32,
        keys: &[K],
        deletes: &mut DeletesMap,
    ) -> Result<()> {
        self.check_widths(keys)?;

        for (i, key) in keys.iter().enumerate() {
            let location = RowLocation::new(segment_id, row_id_start.wrapping_add(i as u32));
            if let Some(old) = self.loaded.index.upsert(key.as_ref(), location) {
                deletes.add(old);
            }
        }
        Ok(())
    }

    /// Remove keys, recording the row each one pointed at in `deletes`.
    /// Absent keys are ignored.
    pub fn erase<K: AsRef<[u8]>>(&mut self, keys: &[K], deletes: &mut DeletesMap) {
        for key in keys {
            if let Some(old) = self.loaded.index.erase(key.as_ref()) {
                deletes.add(old);
            }
        }
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Repoint keys to the rows of a compaction output segment
    ///
    /// `keys[i]` is the key of output row `row_id_start + i`. A key is moved
    /// only if it still lives in one of `source_segments`, the segments the
    /// compaction read. Otherwise it was updated or deleted after compaction
    /// started; its output row offset is appended to `failed` and the index
    /// entry is left as is.
    pub fn try_replace<K: AsRef<[u8]>>(
        &mut self,
        segment_id: u32,
        row_id_start: u32,
        keys: &[K],
        source_segments: &[u32],
        failed: &mut Vec<u32>,
    ) {
        let mut sources = source_segments.to_vec();
        sources.sort_unstable();
        sources.dedup();

        for (i, key) in keys.iter().enumerate() {
            let row_id = row_id_start.wrapping_add(i as u32);
            let location = RowLocation::new(segment_id, row_id);
            if !self
                .loaded
                .index
                .replace_if_from(key.as_ref(), location, &sources)
            {
                failed.push(row_id);
            }
        }
    }

    // =========================================================================
    // Read / Accounting
    // =========================================================================

    /// Current location of each key (None = not found)
    pub fn get<K: AsRef<[u8]>>(&self, keys: &[K]) -> Vec<Option<RowLocation>> {
        keys.iter()
            .map(|key| self.loaded.index.get(key.as_ref()))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.loaded.index.size()
    }

    pub fn capacity(&self) -> usize {
        self.loaded.index.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.loaded.index.memory_usage()
    }

    /// Make room for at least `additional` more keys
    pub fn reserve(&mut self, additional: usize) {
        self.loaded.index.reserve(additional);
    }
}
