//! Activity scheduler: picks what to ask next.
//!
//! Selection is deterministic given the framework, the profile and the
//! session history: lowest-confidence competency first (ties broken by
//! declaration order), the learner's current tier within it, and the
//! first unseen variant from the preparation guide. Repeat avoidance is
//! an explicit exclusion set checked against persisted history, not
//! conversational recall.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use praxis_core::{
    Activity, ActivityId, Competency, CompetencyId, EnginePolicy, EntityKind, FrameworkSet,
    ItemId, LearnerProfile, SessionId, Tier, Verdict,
};
use praxis_store::GraphStore;

use crate::error::Result;

/// Prompt attached to every activity's reflection step.
pub(crate) const REFLECTION_PROMPT: &str =
    "How did the result compare with your prediction, and what would you try differently?";

/// What the scheduler decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    /// Present this activity next.
    Next(Activity),
    /// Every competency reached minimum coverage, or the budget ran out.
    SessionComplete,
}

/// Per-session exposure record maintained by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    presented: HashSet<ItemId>,
    recent: HashSet<ItemId>,
    last_competency: Option<CompetencyId>,
    emitted: u32,
    last_activity_for_item: HashMap<ItemId, ActivityId>,
}

impl SessionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cross-session exclusion set.
    #[must_use]
    pub fn with_recent_items(mut self, recent: HashSet<ItemId>) -> Self {
        self.recent = recent;
        self
    }

    /// Record an emitted practice activity against the budget.
    pub fn record(&mut self, activity: &Activity) {
        self.note(activity);
        self.emitted += 1;
    }

    /// Record a diagnostic probe: exposure only, the practice budget is
    /// untouched.
    pub fn record_probe(&mut self, activity: &Activity) {
        self.note(activity);
    }

    fn note(&mut self, activity: &Activity) {
        if let Some(item) = activity.item {
            self.presented.insert(item);
            self.last_activity_for_item.insert(item, activity.id);
        }
        self.last_competency = Some(activity.competency);
    }

    /// Was this item already presented in this session?
    #[must_use]
    pub fn was_presented(&self, item: ItemId) -> bool {
        self.presented.contains(&item)
    }

    /// Competency targeted by the previous activity.
    #[must_use]
    pub fn last_competency(&self) -> Option<CompetencyId> {
        self.last_competency
    }

    /// Activities emitted so far this session.
    #[must_use]
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Item ids presented in the last `window` sessions other than the
    /// current one, reconstructed from persisted activity entities.
    pub async fn load_recent_items(
        store: &dyn GraphStore,
        current: &SessionId,
        window: u32,
    ) -> Result<HashSet<ItemId>> {
        let graph = store.read_graph().await?;
        let mut by_session: HashMap<SessionId, (chrono::DateTime<chrono::Utc>, Vec<ItemId>)> =
            HashMap::new();

        for entity in graph.entities.iter().filter(|e| e.kind == EntityKind::Activity) {
            let Ok(activity) = serde_json::from_value::<Activity>(entity.data.clone()) else {
                continue;
            };
            if &activity.session == current {
                continue;
            }
            let Some(item) = activity.item else { continue };
            let slot = by_session
                .entry(activity.session.clone())
                .or_insert((activity.created_at, Vec::new()));
            slot.0 = slot.0.max(activity.created_at);
            slot.1.push(item);
        }

        let mut sessions: Vec<_> = by_session.into_values().collect();
        sessions.sort_by_key(|(latest, _)| std::cmp::Reverse(*latest));
        Ok(sessions
            .into_iter()
            .take(window as usize)
            .flat_map(|(_, items)| items)
            .collect())
    }
}

/// Chooses the next activity for a learner.
#[derive(Debug, Clone)]
pub struct ActivityScheduler {
    policy: EnginePolicy,
}

impl ActivityScheduler {
    #[must_use]
    pub fn new(policy: EnginePolicy) -> Self {
        Self { policy }
    }

    /// Is this competency covered well enough to stop probing it?
    fn is_complete(&self, profile: &LearnerProfile, competency: &Competency) -> bool {
        let progress = profile.progress.get(&competency.id);
        progress.is_some_and(|p| {
            p.observations >= self.policy.min_observations && p.tier >= Tier::Intermediate
        })
    }

    /// Confidence sort key: fewest scored observations first, a recent
    /// fail ranks below a clean record, declaration order breaks ties.
    fn confidence_key(profile: &LearnerProfile, competency: &Competency) -> (u32, u8, usize) {
        let progress = profile.progress.get(&competency.id);
        let observations = progress.map(|p| p.observations).unwrap_or(0);
        let recent_fail = progress
            .and_then(|p| p.last_verdict)
            .is_some_and(|v| v == Verdict::Mismatch);
        (observations, u8::from(!recent_fail), competency.order)
    }

    /// Decide the next activity, or report the session complete.
    #[must_use]
    pub fn next_activity(
        &self,
        session: &SessionId,
        set: &FrameworkSet,
        profile: &LearnerProfile,
        history: &SessionHistory,
    ) -> Schedule {
        if history.emitted() >= self.policy.activity_budget {
            debug!(budget = self.policy.activity_budget, "activity budget exhausted");
            return Schedule::SessionComplete;
        }

        let mut incomplete: Vec<&Competency> = set
            .framework
            .active()
            .filter(|c| !self.is_complete(profile, c))
            .collect();
        if incomplete.is_empty() {
            return Schedule::SessionComplete;
        }
        incomplete.sort_by_key(|c| Self::confidence_key(profile, c));

        // Never target the same competency twice in a row unless it is
        // the only one left.
        let target = if incomplete.len() > 1
            && history.last_competency() == Some(incomplete[0].id)
        {
            incomplete[1]
        } else {
            incomplete[0]
        };

        let base_tier = profile.tier_for(target.id).min(target.max_tier);
        let Some((item_id, tier, retry)) = self.pick_variant(set, target, base_tier, history)
        else {
            return Schedule::SessionComplete;
        };

        let Some(item) = set.bank.item(item_id) else {
            return Schedule::SessionComplete;
        };
        let mut activity = Activity::new(
            session.clone(),
            target.id,
            Some(item.id),
            tier,
            item.prompt.clone(),
            REFLECTION_PROMPT,
        );
        if retry {
            if let Some(earlier) = history.last_activity_for_item.get(&item_id) {
                activity = activity.as_retry_of(*earlier);
            }
        }
        debug!(
            competency = %target.name,
            %tier,
            item = %item_id,
            retry,
            "scheduled next activity"
        );
        Schedule::Next(activity)
    }

    /// Variant selection: first unseen variant at the current tier
    /// (preferring ones unused across recent sessions), then a stretch
    /// probe one tier up, then an explicit retry of the first variant.
    fn pick_variant(
        &self,
        set: &FrameworkSet,
        target: &Competency,
        base_tier: Tier,
        history: &SessionHistory,
    ) -> Option<(ItemId, Tier, bool)> {
        let fresh = |tier: Tier| {
            let variants = set.guide.variants(target.id, tier);
            variants
                .iter()
                .find(|id| !history.was_presented(**id) && !history.recent.contains(*id))
                .or_else(|| variants.iter().find(|id| !history.was_presented(**id)))
                .copied()
        };

        if let Some(item) = fresh(base_tier) {
            return Some((item, base_tier, false));
        }

        // All variants at the current tier exhausted: stretch probe.
        let stretch = base_tier.step_up().min(target.max_tier);
        if stretch > base_tier {
            if let Some(item) = fresh(stretch) {
                return Some((item, stretch, false));
            }
        }

        set.guide
            .variants(target.id, base_tier)
            .first()
            .map(|id| (*id, base_tier, true))
    }
}
