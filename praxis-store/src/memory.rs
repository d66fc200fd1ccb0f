//! In-memory reference implementation of the graph store.
//!
//! Used directly in tests and as the behavioral contract for real
//! backends: idempotent writes, append-only observations, and per-profile
//! compare-and-set.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use praxis_core::{
    DomainId, Entity, EntityId, IdempotencyKey, LearnerId, LearnerProfile, Observation,
    ObservationId, Relation, SessionId,
};

use crate::error::{Result, StoreError};
use crate::journal::JsonlJournal;
use crate::traits::{GraphSnapshot, GraphStore};

#[derive(Default)]
struct Inner {
    entities: HashMap<EntityId, Entity>,
    relations: Vec<Relation>,
    observations: Vec<Observation>,
    profiles: HashMap<String, LearnerProfile>,
    applied_keys: HashSet<IdempotencyKey>,
}

impl Inner {
    fn insert_relations(&mut self, relations: Vec<Relation>) {
        for relation in relations {
            if !self.relations.contains(&relation) {
                self.relations.push(relation);
            }
        }
    }
}

/// In-memory graph store behind a single `RwLock`, optionally mirroring
/// every committed observation to a JSONL journal.
///
/// All mutations for one logical write happen under one write guard, which
/// is what makes `finalize_activity` transactional here.
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: RwLock<Inner>,
    journal: Option<JsonlJournal>,
}

impl MemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror committed observations to a durable JSONL journal.
    #[must_use]
    pub fn with_journal(mut self, journal: JsonlJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    fn profile_key(learner: &LearnerId, domain: DomainId) -> String {
        format!("{learner}/{domain}")
    }

    /// Journal writes happen under the same write guard as the in-memory
    /// commit so file order matches commit order.
    async fn mirror(&self, observations: &[Observation]) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.append_all(observations).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn create_entities(&self, entities: Vec<Entity>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for entity in entities {
            inner.entities.insert(entity.id.clone(), entity);
        }
        Ok(())
    }

    async fn create_relations(&self, relations: Vec<Relation>) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.insert_relations(relations);
        Ok(())
    }

    async fn add_observations(
        &self,
        key: IdempotencyKey,
        observations: Vec<Observation>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.applied_keys.contains(&key) {
            debug!(%key, "skipping already-applied observation write");
            return Ok(());
        }
        // Mirror before marking the key applied so a journal failure
        // leaves the write retryable.
        self.mirror(&observations).await?;
        inner.applied_keys.insert(key);
        inner.observations.extend(observations);
        Ok(())
    }

    async fn delete_entities(&self, ids: &[EntityId]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for id in ids {
            inner.entities.remove(id);
        }
        Ok(())
    }

    async fn delete_relations(&self, relations: &[Relation]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.relations.retain(|r| !relations.contains(r));
        Ok(())
    }

    async fn delete_observations(&self, ids: &[ObservationId]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.observations.retain(|o| !ids.contains(&o.id));
        Ok(())
    }

    async fn search_nodes(&self, query: &str) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;
        let needle = query.to_lowercase();
        let mut hits: Vec<Entity> = inner
            .entities
            .values()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.id.as_str().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    async fn open_nodes(&self, ids: &[EntityId]) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.entities.get(id).cloned())
            .collect())
    }

    async fn read_graph(&self) -> Result<GraphSnapshot> {
        let inner = self.inner.read().await;
        Ok(GraphSnapshot {
            entities: inner.entities.values().cloned().collect(),
            relations: inner.relations.clone(),
            observations: inner.observations.clone(),
        })
    }

    async fn observations_for_session(&self, session: &SessionId) -> Result<Vec<Observation>> {
        let inner = self.inner.read().await;
        let mut observations: Vec<Observation> = inner
            .observations
            .iter()
            .filter(|o| &o.session == session)
            .cloned()
            .collect();
        observations.sort_by_key(|o| (o.ts, o.id));
        Ok(observations)
    }

    async fn get_profile(
        &self,
        learner: &LearnerId,
        domain: DomainId,
    ) -> Result<Option<LearnerProfile>> {
        let inner = self.inner.read().await;
        Ok(inner
            .profiles
            .get(&Self::profile_key(learner, domain))
            .cloned())
    }

    async fn put_profile(&self, profile: &LearnerProfile, expected_version: u64) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let key = Self::profile_key(&profile.learner, profile.domain);
        let actual = inner.profiles.get(&key).map(|p| p.version).unwrap_or(0);
        if actual != expected_version {
            debug!(%key, expected_version, actual, "profile write conflict");
            return Err(StoreError::WriteConflict {
                key,
                expected: expected_version,
                actual,
            });
        }
        let mut stored = profile.clone();
        stored.version = expected_version + 1;
        stored.updated_at = chrono::Utc::now();
        let version = stored.version;
        inner.profiles.insert(key, stored);
        Ok(version)
    }

    async fn finalize_activity(
        &self,
        key: IdempotencyKey,
        activity: Entity,
        observations: Vec<Observation>,
        relations: Vec<Relation>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.applied_keys.contains(&key) {
            debug!(%key, "skipping already-applied finalize");
            return Ok(());
        }
        self.mirror(&observations).await?;
        inner.applied_keys.insert(key);
        inner.entities.insert(activity.id.clone(), activity);
        inner.observations.extend(observations);
        inner.insert_relations(relations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_core::{
        Actor, ActivityId, CompetencyId, EntityKind, ObservationKind, RelationKind, Verdict,
    };
    use serde_json::json;

    fn entity(name: &str) -> Entity {
        Entity::new(EntityKind::Competency, name, name, json!({}))
    }

    fn observation(session: &str) -> Observation {
        Observation::new(
            SessionId::new(session),
            Actor::Engine,
            ObservationKind::Note,
            json!({"text": "n"}),
        )
    }

    #[tokio::test]
    async fn create_entities_is_idempotent_by_id() {
        let store = MemoryGraphStore::new();
        store.create_entities(vec![entity("a")]).await.unwrap();
        store.create_entities(vec![entity("a")]).await.unwrap();
        let graph = store.read_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_relations_are_collapsed() {
        let store = MemoryGraphStore::new();
        let relation = Relation::new(
            EntityId::new("competency:a"),
            RelationKind::HasItem,
            EntityId::new("assessment_item:b"),
        );
        store
            .create_relations(vec![relation.clone(), relation.clone()])
            .await
            .unwrap();
        store.create_relations(vec![relation]).await.unwrap();
        let graph = store.read_graph().await.unwrap();
        assert_eq!(graph.relations.len(), 1);
    }

    #[tokio::test]
    async fn observation_writes_are_idempotent_per_key() {
        let store = MemoryGraphStore::new();
        let key = IdempotencyKey::new("obs-1");
        store
            .add_observations(key.clone(), vec![observation("s1")])
            .await
            .unwrap();
        store
            .add_observations(key, vec![observation("s1")])
            .await
            .unwrap();
        let graph = store.read_graph().await.unwrap();
        assert_eq!(graph.observations.len(), 1);
    }

    #[tokio::test]
    async fn observations_filtered_by_session_in_log_order() {
        let store = MemoryGraphStore::new();
        let first = observation("s1");
        let other = observation("s2");
        let second = observation("s1");
        store
            .add_observations(
                IdempotencyKey::new("k1"),
                vec![second.clone(), other, first.clone()],
            )
            .await
            .unwrap();
        let session = SessionId::new("s1");
        let observations = store.observations_for_session(&session).await.unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].id, first.id);
        assert_eq!(observations[1].id, second.id);
    }

    #[tokio::test]
    async fn search_nodes_matches_name_case_insensitively() {
        let store = MemoryGraphStore::new();
        store
            .create_entities(vec![entity("Branch Lifecycle"), entity("merge vs rebase")])
            .await
            .unwrap();
        let hits = store.search_nodes("branch").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Branch Lifecycle");
    }

    #[tokio::test]
    async fn put_profile_creates_at_version_zero() {
        let store = MemoryGraphStore::new();
        let profile = LearnerProfile::new(LearnerId::new("alex"), DomainId::new());
        let version = store.put_profile(&profile, 0).await.unwrap();
        assert_eq!(version, 1);

        let loaded = store
            .get_profile(&profile.learner, profile.domain)
            .await
            .unwrap()
            .expect("profile should exist");
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn put_profile_rejects_stale_version() {
        let store = MemoryGraphStore::new();
        let profile = LearnerProfile::new(LearnerId::new("alex"), DomainId::new());
        store.put_profile(&profile, 0).await.unwrap();

        // A second writer with the stale version loses.
        let err = store.put_profile(&profile, 0).await.unwrap_err();
        match err {
            StoreError::WriteConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected WriteConflict, got {other:?}"),
        }

        // Retrying against the latest version succeeds.
        let version = store.put_profile(&profile, 1).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn finalize_is_transactional_and_idempotent() {
        let store = MemoryGraphStore::new();
        let session = SessionId::new("s1");
        let activity_id = ActivityId::new();
        let competency = CompetencyId::new();
        let key = IdempotencyKey::finalize(activity_id);

        let activity = Entity::new(EntityKind::Activity, activity_id, "activity", json!({}));
        let obs = Observation::verify(session.clone(), activity_id, competency, Verdict::Match, "ok");
        let relation = Relation::new(
            activity.id.clone(),
            RelationKind::Targets,
            EntityId::keyed(EntityKind::Competency, competency),
        );

        store
            .finalize_activity(
                key.clone(),
                activity.clone(),
                vec![obs.clone()],
                vec![relation.clone()],
            )
            .await
            .unwrap();
        // Same key submitted twice: store state unchanged.
        store
            .finalize_activity(key, activity, vec![obs], vec![relation])
            .await
            .unwrap();

        let graph = store.read_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.observations.len(), 1);
        assert_eq!(graph.relations.len(), 1);
    }

    #[tokio::test]
    async fn deletes_remove_only_named_records() {
        let store = MemoryGraphStore::new();
        let keep = entity("keep");
        let drop = entity("drop");
        store
            .create_entities(vec![keep.clone(), drop.clone()])
            .await
            .unwrap();
        store.delete_entities(&[drop.id.clone()]).await.unwrap();
        let graph = store.read_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].id, keep.id);
    }

    #[tokio::test]
    async fn journal_mirrors_committed_observations_once() {
        use crate::journal::ObservationFilter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.jsonl");
        let store = MemoryGraphStore::new().with_journal(JsonlJournal::new(&path));

        let key = IdempotencyKey::new("obs-1");
        store
            .add_observations(key.clone(), vec![observation("s1")])
            .await
            .unwrap();
        // A replayed key must not duplicate journal lines either.
        store
            .add_observations(key, vec![observation("s1")])
            .await
            .unwrap();

        let mirrored = JsonlJournal::new(&path)
            .query(&ObservationFilter::for_session(SessionId::new("s1")))
            .await
            .unwrap();
        assert_eq!(mirrored.len(), 1);
    }

    #[tokio::test]
    async fn open_nodes_skips_unknown_ids() {
        let store = MemoryGraphStore::new();
        let known = entity("known");
        store.create_entities(vec![known.clone()]).await.unwrap();
        let nodes = store
            .open_nodes(&[known.id.clone(), EntityId::new("competency:missing")])
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
