//! Diagnostic engine: initial placement from a short item probe.
//!
//! Placement is intentionally conservative: whatever the raw scores say,
//! a first pass never places above Intermediate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use praxis_core::{
    AssessmentItem, CompetencyId, EnginePolicy, FrameworkSet, LearnerId, LearnerProfile, Tier,
    Verdict,
};

/// Result of the diagnostic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialPlacement {
    /// Placement per sampled competency.
    pub per_competency: BTreeMap<CompetencyId, Tier>,
    /// Rounded-down median across sampled competencies.
    pub overall: Tier,
    pub rationale: String,
}

/// Selects diagnostic items and computes the initial placement.
#[derive(Debug, Clone)]
pub struct DiagnosticEngine {
    policy: EnginePolicy,
}

impl DiagnosticEngine {
    #[must_use]
    pub fn new(policy: EnginePolicy) -> Self {
        Self { policy }
    }

    /// Select 2..=4 items spanning at least two competencies, biased
    /// toward the Foundational and Intermediate tiers, with no two items
    /// from the same competency adjacent.
    #[must_use]
    pub fn plan(&self, set: &FrameworkSet) -> Vec<AssessmentItem> {
        let competencies: Vec<_> = set.framework.active().collect();
        if competencies.len() < 2 {
            return Vec::new();
        }

        let count = self.policy.diagnostic_item_count();
        let mut items = Vec::with_capacity(count);
        for position in 0..count {
            let competency = competencies[position % competencies.len()];
            let tier = if position % 2 == 0 {
                Tier::Foundational
            } else {
                Tier::Intermediate
            }
            .min(competency.max_tier);

            // Competencies rotate, so variant index only moves on a full lap.
            let lap = position / competencies.len();
            let variants = set.guide.variants(competency.id, tier);
            let Some(item_id) = variants.get(lap % variants.len().max(1)) else {
                continue;
            };
            if let Some(item) = set.bank.item(*item_id) {
                items.push(item.clone());
            }
        }
        items
    }

    /// Fold scored responses into a placement.
    ///
    /// Each competency starts at the middle of the scale; a correct
    /// result shifts it up one step, an incorrect one down, anything
    /// inconclusive not at all, clipped to the four-point scale and then
    /// capped at Intermediate.
    #[must_use]
    pub fn place(&self, responses: &[(CompetencyId, Verdict)]) -> InitialPlacement {
        let mut scores: BTreeMap<CompetencyId, i32> = BTreeMap::new();
        for (competency, verdict) in responses {
            let shift = match verdict {
                Verdict::Match => 1,
                Verdict::Mismatch => -1,
                Verdict::Inconclusive => 0,
            };
            let score = scores.entry(*competency).or_insert(Tier::Intermediate.ordinal());
            *score = (*score + shift).clamp(0, 3);
        }

        let per_competency: BTreeMap<CompetencyId, Tier> = scores
            .iter()
            .map(|(id, score)| (*id, Tier::from_ordinal(*score).min(Tier::Intermediate)))
            .collect();

        let mut ordinals: Vec<i32> = per_competency.values().map(|t| t.ordinal()).collect();
        ordinals.sort_unstable();
        let overall = if ordinals.is_empty() {
            Tier::Foundational
        } else {
            // Rounded-down median, capped at Intermediate.
            Tier::from_ordinal(ordinals[(ordinals.len() - 1) / 2]).min(Tier::Intermediate)
        };

        let rationale = format!(
            "diagnostic: {} scored responses across {} competencies; placed {} overall (first-pass cap at intermediate)",
            responses.len(),
            per_competency.len(),
            overall,
        );
        info!(%overall, competencies = per_competency.len(), "diagnostic placement computed");

        InitialPlacement {
            per_competency,
            overall,
            rationale,
        }
    }

    /// Materialize a fresh learner profile from a placement. Unsampled
    /// competencies inherit the overall placement.
    #[must_use]
    pub fn build_profile(
        &self,
        learner: LearnerId,
        set: &FrameworkSet,
        placement: &InitialPlacement,
    ) -> LearnerProfile {
        let mut profile = LearnerProfile::new(learner, set.framework.domain);
        for competency in set.framework.active() {
            let tier = placement
                .per_competency
                .get(&competency.id)
                .copied()
                .unwrap_or(placement.overall);
            profile.progress_mut(competency.id).tier = tier;
        }
        profile.placement_rationale = Some(placement.rationale.clone());
        profile
    }
}
