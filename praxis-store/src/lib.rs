//! praxis-store - Persistence for the adaptive assessment engine
//!
//! This crate provides the typed facade over the external graph store:
//! the `GraphStore` trait consumed by the engine, an in-memory reference
//! implementation with per-profile optimistic concurrency, and an
//! append-only JSONL observation journal.

pub mod error;
pub mod journal;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use journal::{JsonlJournal, ObservationFilter};
pub use memory::MemoryGraphStore;
pub use traits::{GraphSnapshot, GraphStore};
