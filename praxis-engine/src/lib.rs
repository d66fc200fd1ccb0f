//! praxis-engine - Adaptive competency-assessment engine
//!
//! The engine models a learner's proficiency in a declared domain:
//! it generates a competency framework, runs a short diagnostic, then
//! drives a practice loop that sequences verifiable activities, scores
//! them through the verification adapter, and folds the results into a
//! persisted learner profile.
//!
//! The top-level entry point is [`session::SessionOrchestrator`], a
//! finite-state controller over the onboarding, diagnostic, practice and
//! wrap-up phases. Natural-language rendering and concrete sandbox/store
//! backends are external collaborators behind the [`verify::Verifier`]
//! and `praxis_store::GraphStore` traits.

pub mod diagnostic;
pub mod error;
pub mod framework;
pub mod progression;
pub mod scheduler;
pub mod session;
pub mod verify;

pub use diagnostic::{DiagnosticEngine, InitialPlacement};
pub use error::{EngineError, Result};
pub use framework::{
    CompetencySeed, DomainDecomposer, FrameworkBuilder, FrameworkConstraints, TemplateDecomposer,
    VerificationProvider,
};
pub use progression::{ProgressUpdate, ProgressionTracker};
pub use scheduler::{ActivityScheduler, Schedule, SessionHistory};
pub use session::{LearnerResponse, Phase, SessionOrchestrator, TurnOutcome};
pub use verify::{FileInfo, LocalVerifier, MockVerifier, Verifier, VerifyError};
