//! praxis-core - Data model for the adaptive competency-assessment engine
//!
//! This crate holds the shared vocabulary of the engine: competency
//! frameworks, assessment items, activities, the append-only observation
//! log, learner profiles, graph entities/relations, session summaries,
//! and the tunable scheduling/progression policy.
//!
//! It is deliberately I/O-free; storage and verification live in
//! `praxis-store` and `praxis-engine`.

pub mod policy;
pub mod types;

pub use policy::{EnginePolicy, PolicyError};
pub use types::*;
