//! Session lifecycle: phase machine and the orchestrator that drives it.

mod orchestrator;
mod state;

pub use orchestrator::{LearnerResponse, SessionOrchestrator, TurnOutcome};
pub use state::Phase;
