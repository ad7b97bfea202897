//! Index Module
//!
//! The per-tablet primary key index: encoded key → current row location.
//!
//! ## Responsibilities
//! - Build the key → location map from a tablet's committed rowsets
//! - Turn writes into "new location + obsolete old location" (`DeletesMap`)
//! - Reconcile locations after compaction without blocking writers
//! - Release memory for inactive tablets
//!
//! ## Lifecycle
//! ```text
//!            load(tablet)
//!   ┌──────────┐ ──────────► ┌──────────┐
//!   │ Unloaded │             │  Loaded  │ ◄── writer(): IndexWriter
//!   └──────────┘ ◄────────── └──────────┘
//!              unload()
//! ```
//!
//! ## Concurrency Model: Single Writer Token
//!
//! - `load` / `unload` / `try_unload`: serialized by the lifecycle mutex
//! - Mutations: only through `IndexWriter`, which holds the lifecycle mutex
//!   for as long as it lives. There is at most one writer, no per-call locking,
//!   and `unload` waits for the writer to be dropped.

mod hash_index;
mod primary_index;
mod writer;

pub use primary_index::PrimaryIndex;
pub use writer::IndexWriter;
