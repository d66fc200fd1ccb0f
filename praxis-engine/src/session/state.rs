//! Session phase machine.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Phase of an assessment session.
///
/// The only legal paths run forward: onboarding feeds the diagnostic
/// (or practice directly for a returning learner), practice feeds
/// wrap-up, and wrap-up closes the session. Stopping early jumps to
/// wrap-up from any open phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Onboarding,
    Diagnostic,
    Practice,
    WrapUp,
    Closed,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Onboarding => "onboarding",
            Phase::Diagnostic => "diagnostic",
            Phase::Practice => "practice",
            Phase::WrapUp => "wrap_up",
            Phase::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "onboarding" => Some(Phase::Onboarding),
            "diagnostic" => Some(Phase::Diagnostic),
            "practice" => Some(Phase::Practice),
            "wrap_up" => Some(Phase::WrapUp),
            "closed" => Some(Phase::Closed),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_transition(self, next: Phase) -> bool {
        use Phase::{Closed, Diagnostic, Onboarding, Practice, WrapUp};
        matches!(
            (self, next),
            (Onboarding, Diagnostic)
                | (Onboarding, Practice)
                | (Onboarding, WrapUp)
                | (Onboarding, Closed)
                | (Diagnostic, Practice)
                | (Diagnostic, WrapUp)
                | (Practice, WrapUp)
                | (WrapUp, Closed)
        )
    }

    /// Advance to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: Phase) -> Result<()> {
        if !self.can_transition(next) {
            return Err(EngineError::InvalidPhaseTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
