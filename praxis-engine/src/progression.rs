//! Progression tracker: applies a verdict to the learner profile.
//!
//! All tier arithmetic is pure and lives in the core types; this module
//! owns the read-modify-write cycle against the store, including the
//! optimistic-concurrency retry loop and the tier-change audit trail.

use tracing::{info, warn};

use praxis_core::{
    Activity, DomainId, EnginePolicy, Entity, EntityKind, LearnerId, LearnerProfile,
    ProgressEffect, Relation, RelationKind, TierChange, Verdict,
};
use praxis_store::{GraphStore, StoreError};

use crate::error::{EngineError, Result};

/// Result of recording one verdict against a profile.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Profile as persisted, with its new version.
    pub profile: LearnerProfile,
    /// Present when the verdict completed a promotion or demotion streak.
    pub tier_change: Option<TierChange>,
    /// True when a demotion streak completed at the bottom tier.
    pub reinforce: bool,
}

/// Applies verdicts to learner profiles with optimistic concurrency.
#[derive(Debug, Clone)]
pub struct ProgressionTracker {
    policy: EnginePolicy,
}

impl ProgressionTracker {
    #[must_use]
    pub fn new(policy: EnginePolicy) -> Self {
        Self { policy }
    }

    /// Record a verdict for a finalized activity.
    ///
    /// Re-reads the profile and reapplies the verdict on each write
    /// conflict, up to the configured retry count. The conflict error
    /// surfaces once retries are exhausted.
    pub async fn record(
        &self,
        store: &dyn GraphStore,
        learner: &LearnerId,
        domain: DomainId,
        activity: &Activity,
        verdict: Verdict,
    ) -> Result<ProgressUpdate> {
        let mut attempts = 0u32;
        loop {
            let mut profile = store
                .get_profile(learner, domain)
                .await?
                .ok_or_else(|| StoreError::ProfileNotFound(format!("{learner}/{domain}")))?;
            let expected = profile.version;

            let effect = profile.progress_mut(activity.competency).apply(
                verdict,
                self.policy.promote_streak,
                self.policy.demote_streak,
            );

            match store.put_profile(&profile, expected).await {
                Ok(version) => {
                    profile.version = version;
                    return self.finish(store, activity, profile, effect).await;
                }
                Err(StoreError::WriteConflict { key, expected, actual })
                    if attempts < self.policy.cas_retries =>
                {
                    attempts += 1;
                    warn!(%key, expected, actual, attempt = attempts, "profile write conflict, retrying");
                }
                Err(err) => return Err(EngineError::Store(err)),
            }
        }
    }

    async fn finish(
        &self,
        store: &dyn GraphStore,
        activity: &Activity,
        profile: LearnerProfile,
        effect: ProgressEffect,
    ) -> Result<ProgressUpdate> {
        let (tier_change, reinforce) = match effect {
            ProgressEffect::None => (None, false),
            ProgressEffect::Reinforce => (None, true),
            ProgressEffect::Promoted { from, to } | ProgressEffect::Demoted { from, to } => {
                let change = TierChange {
                    competency: activity.competency,
                    activity: activity.id,
                    from,
                    to,
                    at: chrono::Utc::now(),
                };
                info!(
                    competency = %change.competency,
                    from = %change.from,
                    to = %change.to,
                    "tier changed"
                );
                let entity = Entity::new(
                    EntityKind::TierChange,
                    activity.id,
                    format!("{from} -> {to}"),
                    serde_json::to_value(&change).map_err(StoreError::Serialization)?,
                );
                let relation = Relation::new(
                    EntityKind::Activity.entity_id(activity.id),
                    RelationKind::TierChange,
                    entity.id.clone(),
                );
                store.create_entities(vec![entity]).await?;
                store.create_relations(vec![relation]).await?;
                (Some(change), false)
            }
        };

        Ok(ProgressUpdate {
            profile,
            tier_change,
            reinforce,
        })
    }
}
