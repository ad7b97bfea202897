//! Primary index lifecycle
//!
//! Load, unload, and read access. Mutations live in `writer.rs`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::key::{encode_key, KeySchema, KeyValue};
use crate::location::RowLocation;
use crate::tablet::TabletReader;

use super::hash_index::{new_hash_index, HashIndex};
use super::writer::IndexWriter;

/// Lifecycle of the in-memory map
pub(super) enum LoadState {
    Unloaded,
    Loaded(LoadedIndex),
}

/// A populated index and the tablet it was built from
pub(super) struct LoadedIndex {
    pub(super) tablet_id: i64,
    pub(super) index: Box<dyn HashIndex>,
}

/// Primary key index of one tablet
pub struct PrimaryIndex {
    schema: KeySchema,
    config: IndexConfig,
    /// Lifecycle; the loaded map is reachable only through this lock
    state: Mutex<LoadState>,
    /// Mirrors `state` for lock-free `is_loaded`
    loaded: AtomicBool,
}

impl PrimaryIndex {
    /// Create an unloaded index for keys of `schema`
    pub fn new(schema: KeySchema) -> Self {
        Self::with_config(schema, IndexConfig::default())
    }

    pub fn with_config(schema: KeySchema, config: IndexConfig) -> Self {
        Self {
            schema,
            config,
            state: Mutex::new(LoadState::Unloaded),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Tablet the index was loaded from, if loaded
    pub fn tablet_id(&self) -> Option<i64> {
        match &*self.state.lock() {
            LoadState::Loaded(loaded) => Some(loaded.tablet_id),
            LoadState::Unloaded => None,
        }
    }

    // =========================================================================
    // Load / Unload
    // =========================================================================

    /// Build the index from every committed row of `tablet`
    ///
    /// Rows already marked in their segment's delete vector are skipped.
    /// Returns immediately if the index is already loaded. On failure the
    /// index stays unloaded and a later call retries from scratch.
    pub fn load<T: TabletReader + ?Sized>(&self, tablet: &T) -> Result<()> {
        let mut state = self.state.lock();
        if let LoadState::Loaded(_) = *state {
            return Ok(());
        }

        let start = Instant::now();
        match self.do_load(tablet) {
            Ok(loaded) => {
                info!(
                    tablet_id = loaded.tablet_id,
                    keys = loaded.index.size(),
                    memory = loaded.index.memory_usage(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "primary index loaded"
                );
                *state = LoadState::Loaded(loaded);
                self.loaded.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!(tablet_id = tablet.tablet_id(), error = %e, "primary index load failed");
                Err(e)
            }
        }
    }

    fn do_load<T: TabletReader + ?Sized>(&self, tablet: &T) -> Result<LoadedIndex> {
        let tablet_id = tablet.tablet_id();
        let rowsets = tablet.rowsets().map_err(|e| {
            IndexError::IndexLoad(format!(
                "tablet {}: failed to read rowset metas: {}",
                tablet_id, e
            ))
        })?;

        if let Some(bad) = rowsets.iter().find(|r| !r.has_valid_segment_range()) {
            return Err(IndexError::IndexLoad(format!(
                "tablet {}: rowset {} segment range {} + {} exceeds the segment id space",
                tablet_id, bad.rowset_id, bad.rowset_seg_id, bad.num_segments
            )));
        }

        let committed_rows = rowsets
            .iter()
            .try_fold(0u64, |sum, r| sum.checked_add(r.num_rows))
            .and_then(|total| usize::try_from(total).ok())
            .ok_or_else(|| {
                IndexError::IndexLoad(format!(
                    "tablet {}: committed row count overflows",
                    tablet_id
                ))
            })?;
        let capacity = self.config.initial_capacity.max(committed_rows);
        let mut index = new_hash_index(&self.schema);
        index.try_reserve(capacity).map_err(|e| {
            IndexError::IndexLoad(format!(
                "tablet {}: cannot reserve room for {} keys: {}",
                tablet_id, capacity, e
            ))
        })?;

        for rowset in &rowsets {
            let segments = (0..rowset.num_segments).zip(rowset.segment_ids());
            for (segment_index, segment_id) in segments {
                let load_err = |e: IndexError| {
                    IndexError::IndexLoad(format!(
                        "tablet {} segment {}: {}",
                        tablet_id, segment_id, e
                    ))
                };

                let dv = tablet.delete_vector(segment_id).map_err(load_err)?;
                let rows = tablet
                    .segment_keys(rowset, segment_index)
                    .map_err(load_err)?;

                for (row_id, row) in rows.iter().enumerate() {
                    let row_id = u32::try_from(row_id).map_err(|_| {
                        load_err(IndexError::InvalidArgument(
                            "segment has more than u32::MAX rows".to_string(),
                        ))
                    })?;
                    if dv.as_ref().is_some_and(|dv| dv.contains(row_id)) {
                        continue;
                    }
                    let key = encode_key(&self.schema, row).map_err(|e| {
                        IndexError::IndexLoad(format!(
                            "tablet {} segment {} row {}: {}",
                            tablet_id, segment_id, row_id, e
                        ))
                    })?;
                    index.upsert(&key, RowLocation::new(segment_id, row_id));
                }
            }
        }

        Ok(LoadedIndex { tablet_id, index })
    }

    /// Drop the in-memory map; waits for an active writer to finish
    pub fn unload(&self) {
        let mut state = self.state.lock();
        self.release(&mut state);
    }

    /// Like `unload`, but gives up instead of waiting for a writer.
    /// Returns true if the index is unloaded on return.
    pub fn try_unload(&self) -> bool {
        match self.state.try_lock() {
            Some(mut state) => {
                self.release(&mut state);
                true
            }
            None => false,
        }
    }

    fn release(&self, state: &mut MutexGuard<'_, LoadState>) {
        if let LoadState::Loaded(loaded) = std::mem::replace(&mut **state, LoadState::Unloaded) {
            debug!(
                tablet_id = loaded.tablet_id,
                keys = loaded.index.size(),
                memory = loaded.index.memory_usage(),
                "primary index unloaded"
            );
        }
        self.loaded.store(false, Ordering::Release);
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Acquire the single writer token
    ///
    /// Blocks while another writer is alive or a load is in progress.
    pub fn writer(&self) -> Result<IndexWriter<'_>> {
        let guard = self.state.lock();
        let loaded = MutexGuard::try_map(guard, |state| match state {
            LoadState::Loaded(loaded) => Some(loaded),
            LoadState::Unloaded => None,
        })
        .map_err(|_| IndexError::NotLoaded)?;
        Ok(IndexWriter::new(loaded, &self.schema, self.config.insert_check))
    }

    /// Look up the current location of each key (None = not found)
    pub fn get<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<Option<RowLocation>>> {
        match &*self.state.lock() {
            LoadState::Loaded(loaded) => Ok(keys
                .iter()
                .map(|key| loaded.index.get(key.as_ref()))
                .collect()),
            LoadState::Unloaded => Err(IndexError::NotLoaded),
        }
    }

    /// Encode key rows with this index's schema
    pub fn encode_keys(&self, rows: &[Vec<KeyValue>]) -> Result<Vec<Vec<u8>>> {
        crate::key::encode_keys(&self.schema, rows)
    }

    /// Number of keys; 0 while unloaded
    pub fn size(&self) -> usize {
        self.with_index(|index| index.size())
    }

    pub fn capacity(&self) -> usize {
        self.with_index(|index| index.capacity())
    }

    /// Approximate bytes held by the map; 0 while unloaded
    pub fn memory_usage(&self) -> usize {
        self.with_index(|index| index.memory_usage())
    }

    fn with_index(&self, f: impl FnOnce(&dyn HashIndex) -> usize) -> usize {
        match &*self.state.lock() {
            LoadState::Loaded(loaded) => f(loaded.index.as_ref()),
            LoadState::Unloaded => 0,
        }
    }
}

impl fmt::Display for PrimaryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.lock() {
            LoadState::Loaded(loaded) => write!(
                f,
                "PrimaryIndex tablet:{} loaded:true size:{} capacity:{} memory:{}",
                loaded.tablet_id,
                loaded.index.size(),
                loaded.index.capacity(),
                loaded.index.memory_usage()
            ),
            LoadState::Unloaded => write!(f, "PrimaryIndex loaded:false"),
        }
    }
}
