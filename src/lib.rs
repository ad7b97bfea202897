//! # pkindex
//!
//! Primary key index and delete tracking for tablets built from immutable
//! segments:
//! - In-memory key → row location index per tablet
//! - Updates and deletes expressed as obsolete row positions (`DeletesMap`)
//! - Compaction-safe location reconciliation (`try_replace`)
//! - Durable snapshot format for rowset metadata and delete vectors
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Pipeline                          │
//! │              (one writer per tablet, encoded keys)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ upsert / erase / try_replace
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    PrimaryIndex                              │
//! │        (load/unload lock, single IndexWriter token)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ DeletesMap
//!                       ▼
//!               ┌───────────────┐        ┌──────────────────┐
//!               │ Delete Vectors│ ─────► │   SnapshotMeta   │
//!               │ (per segment) │        │  (binary stream) │
//!               └───────────────┘        └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod location;
pub mod deletes;
pub mod tablet;
pub mod index;
pub mod snapshot;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{IndexConfig, InsertCheck};
pub use deletes::DeletesMap;
pub use error::{IndexError, Result};
pub use index::{IndexWriter, PrimaryIndex};
pub use key::{KeySchema, KeyType, KeyValue};
pub use location::RowLocation;
pub use snapshot::{SnapshotMeta, SnapshotType};
pub use tablet::{DelVector, MemTablet, RowsetMeta, TabletMeta, TabletReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pkindex
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
