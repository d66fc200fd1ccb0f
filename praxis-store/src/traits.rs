//! The graph store facade consumed by the engine.
//!
//! Entity and observation writes are append-only and idempotent under
//! retry; deletes exist only for explicit framework regeneration or audit
//! correction. Profile mutation is guarded by a compare-and-set version
//! check so concurrent sessions for the same learner never interleave tier
//! updates inconsistently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use praxis_core::{
    DomainId, Entity, EntityId, IdempotencyKey, LearnerId, LearnerProfile, Observation,
    ObservationId, Relation, SessionId,
};

use crate::error::Result;

/// Full dump of the graph, used by wrap-up to build the session summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub observations: Vec<Observation>,
}

/// Storage operations for the competency graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert entities by id. Submitting the same entity twice has no
    /// duplicate effect.
    async fn create_entities(&self, entities: Vec<Entity>) -> Result<()>;

    /// Add typed directed edges. Duplicate edges are collapsed.
    async fn create_relations(&self, relations: Vec<Relation>) -> Result<()>;

    /// Append observations under an idempotency key; a retried submission
    /// with the same key is a no-op.
    async fn add_observations(
        &self,
        key: IdempotencyKey,
        observations: Vec<Observation>,
    ) -> Result<()>;

    /// Remove entities. Framework regeneration / audit correction only.
    async fn delete_entities(&self, ids: &[EntityId]) -> Result<()>;

    /// Remove relations. Framework regeneration / audit correction only.
    async fn delete_relations(&self, relations: &[Relation]) -> Result<()>;

    /// Remove observations. Audit correction only.
    async fn delete_observations(&self, ids: &[ObservationId]) -> Result<()>;

    /// Entities whose name or id contains the query (case-insensitive).
    async fn search_nodes(&self, query: &str) -> Result<Vec<Entity>>;

    /// Fetch specific entities by id; unknown ids are skipped.
    async fn open_nodes(&self, ids: &[EntityId]) -> Result<Vec<Entity>>;

    /// Full graph snapshot.
    async fn read_graph(&self) -> Result<GraphSnapshot>;

    /// Observations for one session, in log order.
    async fn observations_for_session(&self, session: &SessionId) -> Result<Vec<Observation>>;

    /// Current profile for a (learner, domain), if any.
    async fn get_profile(
        &self,
        learner: &LearnerId,
        domain: DomainId,
    ) -> Result<Option<LearnerProfile>>;

    /// Compare-and-set profile write. Succeeds only when the stored version
    /// equals `expected_version` (0 for creation); returns the new version.
    async fn put_profile(&self, profile: &LearnerProfile, expected_version: u64) -> Result<u64>;

    /// Transactional finalize: either the activity entity, its observations
    /// and its relations are all persisted, or none are. Retrying with the
    /// same key leaves the store unchanged.
    async fn finalize_activity(
        &self,
        key: IdempotencyKey,
        activity: Entity,
        observations: Vec<Observation>,
        relations: Vec<Relation>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait is object-safe
    #[test]
    fn graph_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn GraphStore>) {}
    }
}
