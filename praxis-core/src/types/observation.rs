//! The append-only observation log.
//!
//! Observations are immutable, timestamped facts attached to an activity or
//! learner profile. Tier estimates are derived views over this log; replaying
//! it must reproduce the stored tiers exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::activity::Verdict;
use super::ids::{ActivityId, CompetencyId, ObservationId, SessionId};

/// Who produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    #[default]
    System,
    Learner,
    Engine,
}

impl Actor {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Learner => "learner",
            Self::Engine => "engine",
        }
    }
}

/// Kind of recorded fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// A learner answer or prediction.
    Submission,
    /// A scored verification result.
    Verify,
    /// Engine feedback attached to an outcome.
    Feedback,
    /// A hint shown to the learner.
    Hint,
    /// Free-form narrative note.
    Note,
    /// A learner reflection response.
    Reflection,
    /// Session/phase lifecycle marker.
    State,
    /// Derived numeric metric (e.g. placement).
    Metric,
}

impl ObservationKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Verify => "verify",
            Self::Feedback => "feedback",
            Self::Hint => "hint",
            Self::Note => "note",
            Self::Reflection => "reflection",
            Self::State => "state",
            Self::Metric => "metric",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submission" => Some(Self::Submission),
            "verify" => Some(Self::Verify),
            "feedback" => Some(Self::Feedback),
            "hint" => Some(Self::Hint),
            "note" => Some(Self::Note),
            "reflection" => Some(Self::Reflection),
            "state" => Some(Self::State),
            "metric" => Some(Self::Metric),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied rubric score for an open-ended response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Pass,
    Partial,
    Fail,
}

impl Score {
    /// Map a rubric score onto a verification verdict.
    #[must_use]
    pub fn as_verdict(&self) -> Verdict {
        match self {
            Self::Pass => Verdict::Match,
            Self::Fail => Verdict::Mismatch,
            Self::Partial => Verdict::Inconclusive,
        }
    }
}

/// One immutable entry of the observation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub ts: DateTime<Utc>,
    pub actor: Actor,
    pub session: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competency: Option<CompetencyId>,
    pub kind: ObservationKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// An earlier observation this one corrects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ObservationId>,
}

impl Observation {
    /// Create a new observation with required fields.
    #[must_use]
    pub fn new(session: SessionId, actor: Actor, kind: ObservationKind, data: Value) -> Self {
        Self {
            id: ObservationId::new(),
            ts: Utc::now(),
            actor,
            session,
            activity: None,
            competency: None,
            kind,
            tags: Vec::new(),
            data,
            confidence: None,
            supersedes: None,
        }
    }

    /// Attach the activity this observation belongs to.
    #[must_use]
    pub fn with_activity(mut self, activity: ActivityId) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Attach the competency this observation targets.
    #[must_use]
    pub fn with_competency(mut self, competency: CompetencyId) -> Self {
        self.competency = Some(competency);
        self
    }

    /// Attach tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach a numeric confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Record a scored verification result for an activity.
    ///
    /// The verdict is embedded in the data payload so tier replay can be
    /// computed from the log alone.
    #[must_use]
    pub fn verify(
        session: SessionId,
        activity: ActivityId,
        competency: CompetencyId,
        verdict: Verdict,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(
            session,
            Actor::Engine,
            ObservationKind::Verify,
            json!({ "verdict": verdict.as_str(), "detail": detail.into() }),
        )
        .with_activity(activity)
        .with_competency(competency)
    }

    /// The verdict carried by a `Verify` observation, if any.
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        if self.kind != ObservationKind::Verify {
            return None;
        }
        self.data
            .get("verdict")
            .and_then(Value::as_str)
            .and_then(Verdict::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_observation_carries_parseable_verdict() {
        let obs = Observation::verify(
            SessionId::new("s1"),
            ActivityId::new(),
            CompetencyId::new(),
            Verdict::Mismatch,
            "stdout differed",
        );
        assert_eq!(obs.kind, ObservationKind::Verify);
        assert_eq!(obs.verdict(), Some(Verdict::Mismatch));
        assert!(obs.activity.is_some());
        assert!(obs.competency.is_some());
    }

    #[test]
    fn non_verify_observations_have_no_verdict() {
        let obs = Observation::new(
            SessionId::new("s1"),
            Actor::Learner,
            ObservationKind::Reflection,
            json!({ "text": "I expected a conflict" }),
        );
        assert_eq!(obs.verdict(), None);
    }

    #[test]
    fn score_maps_onto_verdict() {
        assert_eq!(Score::Pass.as_verdict(), Verdict::Match);
        assert_eq!(Score::Fail.as_verdict(), Verdict::Mismatch);
        assert_eq!(Score::Partial.as_verdict(), Verdict::Inconclusive);
    }

    #[test]
    fn kind_string_round_trip() {
        for kind in [
            ObservationKind::Submission,
            ObservationKind::Verify,
            ObservationKind::Feedback,
            ObservationKind::Hint,
            ObservationKind::Note,
            ObservationKind::Reflection,
            ObservationKind::State,
            ObservationKind::Metric,
        ] {
            assert_eq!(ObservationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObservationKind::parse("gossip"), None);
    }

    #[test]
    fn serialization_round_trip() {
        let obs = Observation::new(
            SessionId::new("s1"),
            Actor::System,
            ObservationKind::State,
            json!({ "meta": "started" }),
        )
        .with_tags(vec!["session_start".into()])
        .with_confidence(0.9);
        let json = serde_json::to_string(&obs).unwrap();
        let parsed: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, obs);
    }
}
