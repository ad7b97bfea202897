//! Configuration for pkindex
//!
//! Centralized configuration with sensible defaults.

use crate::error::{IndexError, Result};

/// Largest capacity hint accepted by the builder (row offsets are 32-bit)
const MAX_INITIAL_CAPACITY: usize = u32::MAX as usize;

/// Configuration for a primary index
#[derive(Debug, Clone)]
pub struct IndexConfig {
    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Number of keys to reserve room for before `load` starts scanning.
    /// `load` also reserves the committed row count, whichever is larger.
    pub initial_capacity: usize,

    /// How `insert` treats its "key must not exist" precondition
    pub insert_check: InsertCheck,
}

/// Handling of the `insert` precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertCheck {
    /// Caller guarantees uniqueness; an existing entry is overwritten
    Trusted,

    /// Batch is validated first and rejected with `DuplicateKey` on conflict
    Strict,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            insert_check: InsertCheck::Trusted,
        }
    }
}

impl IndexConfig {
    /// Create a new config builder
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

/// Builder for IndexConfig
#[derive(Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Set the capacity reserved before loading
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Set the insert precondition mode
    pub fn insert_check(mut self, check: InsertCheck) -> Self {
        self.config.insert_check = check;
        self
    }

    pub fn build(self) -> Result<IndexConfig> {
        if self.config.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(IndexError::Config(format!(
                "initial_capacity {} exceeds the maximum of {}",
                self.config.initial_capacity, MAX_INITIAL_CAPACITY
            )));
        }
        Ok(self.config)
    }
}
