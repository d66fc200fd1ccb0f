//! Session summary produced at wrap-up.

use serde::{Deserialize, Serialize};

use super::activity::Verdict;
use super::ids::{ActivityId, CompetencyId, DomainId, SessionId};
use super::tier::Tier;

/// What the engine suggests the learner do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Keep practicing; minimum coverage not reached yet.
    #[default]
    ContinuePractice,
    /// Coverage reached at Intermediate or above; probe readiness.
    ReadinessCheck,
    /// Every competency at Advanced or above; move on.
    Advance,
}

impl Recommendation {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContinuePractice => "continue_practice",
            Self::ReadinessCheck => "readiness_check",
            Self::Advance => "advance",
        }
    }
}

/// Entry/exit tier for one competency across the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencySummary {
    pub competency: CompetencyId,
    pub name: String,
    pub entry_tier: Tier,
    pub exit_tier: Tier,
}

/// Outcome of one finalized activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub activity: ActivityId,
    pub competency: CompetencyId,
    pub verdict: Verdict,
}

/// Structured record persisted at wrap-up, related to the learner profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: SessionId,
    pub domain: DomainId,
    pub domain_name: String,
    pub competencies: Vec<CompetencySummary>,
    /// Only finalized activities appear here.
    pub activities: Vec<ActivityOutcome>,
    pub duration_secs: u64,
    pub recommendation: Recommendation,
    /// Set when profile persistence was abandoned after conflict retries.
    pub partial_persist: bool,
}
