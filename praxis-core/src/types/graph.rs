//! Graph entities and typed relations, as seen by the store adapter.
//!
//! Domain objects are persisted as entities with a JSON payload; edges
//! between them are typed relations. Writes are keyed by a caller-supplied
//! idempotency key so retried submissions have no duplicate effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::ActivityId;

/// String key addressing one entity in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id from a raw string key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Namespaced key for a typed entity, e.g. `activity:<uuid>`.
    #[must_use]
    pub fn keyed(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        Self(format!("{}:{id}", kind.as_str()))
    }

    /// Get the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Domain,
    Competency,
    AssessmentItem,
    PreparationGuide,
    Activity,
    LearnerProfile,
    TierChange,
    SessionSummary,
}

impl EntityKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Competency => "competency",
            Self::AssessmentItem => "assessment_item",
            Self::PreparationGuide => "preparation_guide",
            Self::Activity => "activity",
            Self::LearnerProfile => "learner_profile",
            Self::TierChange => "tier_change",
            Self::SessionSummary => "session_summary",
        }
    }

    /// Namespaced entity id for this kind.
    #[must_use]
    pub fn entity_id(&self, id: impl std::fmt::Display) -> EntityId {
        EntityId::keyed(*self, id)
    }

    /// Parse from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domain" => Some(Self::Domain),
            "competency" => Some(Self::Competency),
            "assessment_item" => Some(Self::AssessmentItem),
            "preparation_guide" => Some(Self::PreparationGuide),
            "activity" => Some(Self::Activity),
            "learner_profile" => Some(Self::LearnerProfile),
            "tier_change" => Some(Self::TierChange),
            "session_summary" => Some(Self::SessionSummary),
            _ => None,
        }
    }
}

/// One node of the persisted graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// Full serialized domain object.
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Create an entity with a namespaced id derived from its kind.
    #[must_use]
    pub fn new(
        kind: EntityKind,
        id: impl std::fmt::Display,
        name: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: EntityId::keyed(kind, id),
            kind,
            name: name.into(),
            data,
            created_at: Utc::now(),
        }
    }
}

/// Type of a directed edge in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Competency → AssessmentItem
    HasItem,
    /// PreparationGuide → Activity
    Recommended,
    /// Activity → Competency
    Targets,
    /// Activity → Activity (correction) or Competency → Competency
    /// (framework regeneration)
    Supersedes,
    /// Session summary → Activity
    Includes,
    /// Activity → TierChange audit record
    TierChange,
}

impl RelationKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasItem => "has_item",
            Self::Recommended => "recommended",
            Self::Targets => "targets",
            Self::Supersedes => "supersedes",
            Self::Includes => "includes",
            Self::TierChange => "tier_change",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "has_item" => Some(Self::HasItem),
            "recommended" => Some(Self::Recommended),
            "targets" => Some(Self::Targets),
            "supersedes" => Some(Self::Supersedes),
            "includes" => Some(Self::Includes),
            "tier_change" => Some(Self::TierChange),
            _ => None,
        }
    }
}

/// One typed directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub from: EntityId,
    pub kind: RelationKind,
    pub to: EntityId,
}

impl Relation {
    #[must_use]
    pub fn new(from: EntityId, kind: RelationKind, to: EntityId) -> Self {
        Self { from, kind, to }
    }
}

/// Caller-supplied key making a logical write safe to retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Create a key from a raw string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for the one-shot finalize write of an activity.
    #[must_use]
    pub fn finalize(activity: ActivityId) -> Self {
        Self(format!("finalize:{activity}"))
    }

    /// Get the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_entity_ids_are_namespaced() {
        let activity = ActivityId::new();
        let id = EntityId::keyed(EntityKind::Activity, activity);
        assert_eq!(id.as_str(), format!("activity:{activity}"));
    }

    #[test]
    fn entity_new_derives_id_from_kind() {
        let entity = Entity::new(
            EntityKind::Competency,
            "abc",
            "branch lifecycle",
            json!({"order": 0}),
        );
        assert_eq!(entity.id.as_str(), "competency:abc");
        assert_eq!(entity.kind, EntityKind::Competency);
    }

    #[test]
    fn finalize_keys_are_stable_per_activity() {
        let activity = ActivityId::new();
        assert_eq!(
            IdempotencyKey::finalize(activity),
            IdempotencyKey::finalize(activity)
        );
    }

    #[test]
    fn relation_kind_string_round_trip() {
        for kind in [
            RelationKind::HasItem,
            RelationKind::Recommended,
            RelationKind::Targets,
            RelationKind::Supersedes,
            RelationKind::Includes,
            RelationKind::TierChange,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn entity_kind_string_round_trip() {
        for kind in [
            EntityKind::Domain,
            EntityKind::Competency,
            EntityKind::AssessmentItem,
            EntityKind::PreparationGuide,
            EntityKind::Activity,
            EntityKind::LearnerProfile,
            EntityKind::TierChange,
            EntityKind::SessionSummary,
        ] {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
    }
}
