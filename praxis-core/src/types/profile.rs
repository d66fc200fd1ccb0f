//! Learner profiles and streak-based tier progression.
//!
//! The streak policy lives here as pure functions on `CompetencyProgress`
//! so the progression tracker and log replay share one implementation:
//! replaying the observation log must reproduce the stored tiers exactly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::Verdict;
use super::ids::{ActivityId, CompetencyId, DomainId, LearnerId};
use super::observation::Observation;
use super::tier::Tier;

/// An audited tier change, persisted as its own entity plus a relation
/// from the activity that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierChange {
    pub competency: CompetencyId,
    pub activity: ActivityId,
    pub from: Tier,
    pub to: Tier,
    pub at: DateTime<Utc>,
}

/// What applying one verdict to a competency's progress did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEffect {
    /// Streaks updated, tier unchanged.
    None,
    /// Promotion streak completed; tier moved up.
    Promoted { from: Tier, to: Tier },
    /// Demotion streak completed; tier moved down.
    Demoted { from: Tier, to: Tier },
    /// Demotion streak completed at Foundational; recommend reinforcement
    /// instead of demoting.
    Reinforce,
}

/// Per-competency progress inside a learner profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetencyProgress {
    pub tier: Tier,
    pub match_streak: u32,
    pub mismatch_streak: u32,
    /// Count of scored (Match/Mismatch) observations. Inconclusive results
    /// are excluded here as well as from the streaks.
    pub observations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed_at: Option<DateTime<Utc>>,
}

impl CompetencyProgress {
    /// Start progress at a given tier.
    #[must_use]
    pub fn at_tier(tier: Tier) -> Self {
        Self {
            tier,
            ..Self::default()
        }
    }

    /// Fold one verdict into the streaks, possibly moving the tier.
    ///
    /// Three consecutive `Match` results promote one tier (capped at
    /// Expert); `demote_streak` consecutive `Mismatch` results demote one
    /// tier (floored at Foundational, where a reinforce recommendation is
    /// emitted instead). `Inconclusive` leaves the streaks untouched.
    pub fn apply(&mut self, verdict: Verdict, promote_streak: u32, demote_streak: u32) -> ProgressEffect {
        match verdict {
            Verdict::Inconclusive => return ProgressEffect::None,
            Verdict::Match => {
                self.match_streak += 1;
                self.mismatch_streak = 0;
            }
            Verdict::Mismatch => {
                self.mismatch_streak += 1;
                self.match_streak = 0;
            }
        }
        self.observations += 1;
        self.last_verdict = Some(verdict);
        self.last_observed_at = Some(Utc::now());

        if self.match_streak >= promote_streak {
            self.match_streak = 0;
            if self.tier < Tier::Expert {
                let from = self.tier;
                self.tier = self.tier.step_up();
                return ProgressEffect::Promoted {
                    from,
                    to: self.tier,
                };
            }
            return ProgressEffect::None;
        }

        if self.mismatch_streak >= demote_streak {
            self.mismatch_streak = 0;
            if self.tier > Tier::Foundational {
                let from = self.tier;
                self.tier = self.tier.step_down();
                return ProgressEffect::Demoted {
                    from,
                    to: self.tier,
                };
            }
            return ProgressEffect::Reinforce;
        }

        ProgressEffect::None
    }
}

/// One profile per (learner, domain).
///
/// Mutated only by the progression tracker, guarded by an optimistic
/// version check in the store. Archived (never deleted) at session close
/// and reactivated when a later session resumes the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner: LearnerId,
    pub domain: DomainId,
    pub progress: BTreeMap<CompetencyId, CompetencyProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_rationale: Option<String>,
    /// Version counter for compare-and-set updates.
    pub version: u64,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearnerProfile {
    /// Create an empty profile at version 0.
    #[must_use]
    pub fn new(learner: LearnerId, domain: DomainId) -> Self {
        let now = Utc::now();
        Self {
            learner,
            domain,
            progress: BTreeMap::new(),
            placement_rationale: None,
            version: 0,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Store key for this profile; write serialization is per this key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.learner, self.domain)
    }

    /// Current tier for a competency, defaulting to Foundational.
    #[must_use]
    pub fn tier_for(&self, competency: CompetencyId) -> Tier {
        self.progress
            .get(&competency)
            .map(|p| p.tier)
            .unwrap_or_default()
    }

    /// Mutable progress entry for a competency, created on first touch.
    pub fn progress_mut(&mut self, competency: CompetencyId) -> &mut CompetencyProgress {
        self.progress.entry(competency).or_default()
    }
}

/// Recompute per-competency progress from scratch by folding the `Verify`
/// observations of a log in time order.
///
/// This is the audit path behind tier monotonicity: the result must equal
/// the progress stored on the live profile.
#[must_use]
pub fn replay_progress(
    observations: &[Observation],
    entry_tiers: &BTreeMap<CompetencyId, Tier>,
    promote_streak: u32,
    demote_streak: u32,
) -> BTreeMap<CompetencyId, CompetencyProgress> {
    // Observation ids only order at millisecond granularity; the capture
    // timestamp disambiguates bursts within the same millisecond.
    let mut ordered: Vec<&Observation> = observations.iter().collect();
    ordered.sort_by_key(|o| (o.ts, o.id));

    let mut progress: BTreeMap<CompetencyId, CompetencyProgress> = entry_tiers
        .iter()
        .map(|(id, tier)| (*id, CompetencyProgress::at_tier(*tier)))
        .collect();

    for obs in ordered {
        let (Some(competency), Some(verdict)) = (obs.competency, obs.verdict()) else {
            continue;
        };
        progress
            .entry(competency)
            .or_default()
            .apply(verdict, promote_streak, demote_streak);
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    const PROMOTE: u32 = 3;
    const DEMOTE: u32 = 2;

    #[test]
    fn three_matches_promote_one_tier() {
        let mut progress = CompetencyProgress::at_tier(Tier::Intermediate);
        assert_eq!(
            progress.apply(Verdict::Match, PROMOTE, DEMOTE),
            ProgressEffect::None
        );
        assert_eq!(
            progress.apply(Verdict::Match, PROMOTE, DEMOTE),
            ProgressEffect::None
        );
        assert_eq!(
            progress.apply(Verdict::Match, PROMOTE, DEMOTE),
            ProgressEffect::Promoted {
                from: Tier::Intermediate,
                to: Tier::Advanced,
            }
        );
        assert_eq!(progress.tier, Tier::Advanced);
        assert_eq!(progress.match_streak, 0);
    }

    #[test]
    fn promotion_caps_at_expert() {
        let mut progress = CompetencyProgress::at_tier(Tier::Expert);
        for _ in 0..3 {
            progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        }
        assert_eq!(progress.tier, Tier::Expert);
    }

    #[test]
    fn two_mismatches_demote_one_tier() {
        let mut progress = CompetencyProgress::at_tier(Tier::Advanced);
        progress.apply(Verdict::Mismatch, PROMOTE, DEMOTE);
        let effect = progress.apply(Verdict::Mismatch, PROMOTE, DEMOTE);
        assert_eq!(
            effect,
            ProgressEffect::Demoted {
                from: Tier::Advanced,
                to: Tier::Intermediate,
            }
        );
    }

    #[test]
    fn mismatches_at_foundational_reinforce_without_demoting() {
        let mut progress = CompetencyProgress::at_tier(Tier::Foundational);
        progress.apply(Verdict::Mismatch, PROMOTE, DEMOTE);
        let effect = progress.apply(Verdict::Mismatch, PROMOTE, DEMOTE);
        assert_eq!(effect, ProgressEffect::Reinforce);
        assert_eq!(progress.tier, Tier::Foundational);
    }

    #[test]
    fn inconclusive_leaves_streaks_untouched() {
        let mut progress = CompetencyProgress::at_tier(Tier::Intermediate);
        progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        progress.apply(Verdict::Inconclusive, PROMOTE, DEMOTE);
        assert_eq!(progress.match_streak, 2);
        assert_eq!(progress.observations, 2);
        // The streak survives the inconclusive gap.
        let effect = progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        assert_eq!(
            effect,
            ProgressEffect::Promoted {
                from: Tier::Intermediate,
                to: Tier::Advanced,
            }
        );
    }

    #[test]
    fn mismatch_resets_match_streak() {
        let mut progress = CompetencyProgress::at_tier(Tier::Intermediate);
        progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        progress.apply(Verdict::Match, PROMOTE, DEMOTE);
        progress.apply(Verdict::Mismatch, PROMOTE, DEMOTE);
        assert_eq!(progress.match_streak, 0);
        assert_eq!(progress.mismatch_streak, 1);
    }

    #[test]
    fn replay_reproduces_applied_progress() {
        let session = SessionId::new("replay");
        let competency = CompetencyId::new();
        let mut entry = BTreeMap::new();
        entry.insert(competency, Tier::Intermediate);

        let verdicts = [
            Verdict::Match,
            Verdict::Inconclusive,
            Verdict::Match,
            Verdict::Mismatch,
            Verdict::Match,
            Verdict::Match,
            Verdict::Match,
        ];

        let mut live = CompetencyProgress::at_tier(Tier::Intermediate);
        let mut log = Vec::new();
        for verdict in verdicts {
            live.apply(verdict, PROMOTE, DEMOTE);
            log.push(Observation::verify(
                session.clone(),
                ActivityId::new(),
                competency,
                verdict,
                "test",
            ));
        }

        let replayed = replay_progress(&log, &entry, PROMOTE, DEMOTE);
        assert_eq!(replayed[&competency].tier, live.tier);
        assert_eq!(replayed[&competency].observations, live.observations);
        assert_eq!(replayed[&competency].match_streak, live.match_streak);
    }

    #[test]
    fn profile_defaults_to_foundational() {
        let profile = LearnerProfile::new(LearnerId::new("alex"), DomainId::new());
        assert_eq!(profile.tier_for(CompetencyId::new()), Tier::Foundational);
        assert_eq!(profile.version, 0);
        assert!(!profile.archived);
    }

    #[test]
    fn profile_key_combines_learner_and_domain() {
        let domain = DomainId::new();
        let profile = LearnerProfile::new(LearnerId::new("alex"), domain);
        assert_eq!(profile.key(), format!("alex/{domain}"));
    }

    #[test]
    fn profile_serialization_round_trip() {
        let mut profile = LearnerProfile::new(LearnerId::new("alex"), DomainId::new());
        profile
            .progress_mut(CompetencyId::new())
            .apply(Verdict::Match, PROMOTE, DEMOTE);
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: LearnerProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile);
    }
}
