//! Engine error taxonomy.
//!
//! Only onboarding-time failures are fatal to a session. Adapter errors
//! during diagnostic or practice are contained per-activity: the activity
//! is marked inconclusive and the session continues.

use thiserror::Error;

use praxis_store::StoreError;

use crate::verify::VerifyError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The domain cannot be decomposed into at least two competencies.
    /// Surfaced to the caller for re-prompt; no state is created.
    #[error("domain too vague to decompose: {0}")]
    DomainTooVague(String),

    /// Framework persistence failed at onboarding; fatal to session start.
    #[error("failed to persist competency framework: {0}")]
    FrameworkPersistFailed(#[source] StoreError),

    /// An adapter stayed unreachable after the bounded retry.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("no activity is pending; call begin() or let the scheduler emit one")]
    NoPendingActivity,

    #[error("activity {0} is already finalized")]
    ActivityAlreadyFinalized(praxis_core::ActivityId),

    #[error("session is closed")]
    SessionClosed,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
