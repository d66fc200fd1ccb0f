//! Activities: one presented, verifiable task instance.
//!
//! An activity is created when the scheduler emits it and finalized exactly
//! once, after the verification result and learner response are recorded.
//! Corrections never mutate a finalized activity; they are new activities
//! linked with a supersedes relation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActivityId, CompetencyId, ItemId, SessionId};
use super::tier::Tier;

/// Outcome of a mechanical verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Result matched the expected outcome.
    Match,
    /// Result contradicted the expected outcome.
    Mismatch,
    /// Timeout, unreachable tool, or otherwise ambiguous result.
    /// Never advances tier and is excluded from streak math.
    Inconclusive,
}

impl Verdict {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Mismatch => "mismatch",
            Self::Inconclusive => "inconclusive",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "match" => Some(Self::Match),
            "mismatch" => Some(Self::Mismatch),
            "inconclusive" => Some(Self::Inconclusive),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Captured output of an executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was killed (e.g. on timeout).
    pub exit_code: Option<i32>,
}

/// Verdict plus the raw evidence it was derived from.
///
/// The raw result is always kept alongside the learner's prediction so the
/// comparison stays auditable even when verification itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CommandOutput>,
    /// Human-readable note on how the verdict was reached.
    pub detail: String,
}

impl VerificationOutcome {
    #[must_use]
    pub fn inconclusive(detail: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Inconclusive,
            output: None,
            detail: detail.into(),
        }
    }
}

/// One presented task instance tied to a competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub session: SessionId,
    pub competency: CompetencyId,
    /// None for ad-hoc tasks not drawn from the bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
    /// Learner tier at the time of presentation.
    pub tier: Tier,
    pub prompt: String,
    pub reflection_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    /// Set when this re-presents an item already seen this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<ActivityId>,
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Create a fresh, unfinalized activity for one competency.
    #[must_use]
    pub fn new(
        session: SessionId,
        competency: CompetencyId,
        item: Option<ItemId>,
        tier: Tier,
        prompt: impl Into<String>,
        reflection_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            session,
            competency,
            item,
            tier,
            prompt: prompt.into(),
            reflection_prompt: reflection_prompt.into(),
            prediction: None,
            verification: None,
            reflection: None,
            retry_of: None,
            finalized: false,
            created_at: Utc::now(),
        }
    }

    /// Mark this activity as a retry of an earlier one.
    #[must_use]
    pub fn as_retry_of(mut self, earlier: ActivityId) -> Self {
        self.retry_of = Some(earlier);
        self
    }

    /// The verdict recorded at verification time, if any.
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        self.verification.as_ref().map(|v| v.verdict)
    }
}
