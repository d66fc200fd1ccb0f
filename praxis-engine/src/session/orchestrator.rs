//! Session orchestrator.
//!
//! Drives one assessment session end to end: onboarding builds and
//! persists the competency framework, the diagnostic places the learner,
//! and the practice loop alternates scheduled activities with verified
//! submissions until coverage or the activity budget is reached.
//!
//! Failure containment is deliberate: only onboarding errors are fatal.
//! A verifier or store failure during an activity marks that activity
//! inconclusive (or flags the summary as partially persisted) and the
//! session moves on.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use praxis_core::{
    Activity, ActivityOutcome, Actor, AssessmentItem, CommandOutput, CompetencyId,
    CompetencySummary, DomainId, EnginePolicy, Entity, EntityKind, FrameworkSet, IdempotencyKey,
    LearnerId, LearnerProfile, Observation, ObservationKind, ProgressEffect, Recommendation,
    Relation, RelationKind, Score, SessionId, SessionSummary, Tier, TierChange, Verdict,
    VerificationOutcome, VerificationSpec,
};
use praxis_store::{GraphStore, StoreError};

use crate::diagnostic::DiagnosticEngine;
use crate::error::{EngineError, Result};
use crate::framework::{FrameworkBuilder, FrameworkConstraints};
use crate::progression::ProgressionTracker;
use crate::scheduler::{ActivityScheduler, Schedule, SessionHistory, REFLECTION_PROMPT};
use crate::session::Phase;
use crate::verify::{self, Verifier, VerifyError};

/// One learner turn: the answer plus optional prediction, self-score
/// and reflection.
#[derive(Debug, Clone, Default)]
pub struct LearnerResponse {
    pub answer: String,
    pub prediction: Option<String>,
    /// Used only when the item carries no mechanical verification.
    pub self_score: Option<Score>,
    pub reflection: Option<String>,
}

impl LearnerResponse {
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_prediction(mut self, prediction: impl Into<String>) -> Self {
        self.prediction = Some(prediction.into());
        self
    }

    #[must_use]
    pub fn with_self_score(mut self, score: Score) -> Self {
        self.self_score = Some(score);
        self
    }

    #[must_use]
    pub fn with_reflection(mut self, reflection: impl Into<String>) -> Self {
        self.reflection = Some(reflection.into());
        self
    }
}

/// What one submitted activity produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The finalized activity, verification attached.
    pub activity: Activity,
    pub verdict: Verdict,
    /// Present when this verdict completed a promotion or demotion streak.
    pub tier_change: Option<TierChange>,
    /// True when a demotion streak completed at the bottom tier.
    pub reinforce: bool,
    /// True when the session moved to wrap-up; call [`SessionOrchestrator::stop`].
    pub session_complete: bool,
}

/// Finite-state controller for one assessment session.
pub struct SessionOrchestrator {
    store: Arc<dyn GraphStore>,
    verifier: Arc<dyn Verifier>,
    policy: EnginePolicy,
    builder: FrameworkBuilder,
    diagnostic: DiagnosticEngine,
    scheduler: ActivityScheduler,
    tracker: ProgressionTracker,
    session: SessionId,
    learner: LearnerId,
    phase: Phase,
    set: Option<FrameworkSet>,
    profile: Option<LearnerProfile>,
    pending: Option<Activity>,
    diagnostic_queue: VecDeque<AssessmentItem>,
    diagnostic_responses: Vec<(CompetencyId, Verdict)>,
    entry_tiers: BTreeMap<CompetencyId, Tier>,
    history: SessionHistory,
    outcomes: Vec<ActivityOutcome>,
    started_at: DateTime<Utc>,
    partial_persist: bool,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        verifier: Arc<dyn Verifier>,
        learner: LearnerId,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            builder: FrameworkBuilder::new(),
            diagnostic: DiagnosticEngine::new(policy.clone()),
            scheduler: ActivityScheduler::new(policy.clone()),
            tracker: ProgressionTracker::new(policy.clone()),
            policy,
            session: SessionId::new(uuid::Uuid::new_v4().to_string()),
            learner,
            phase: Phase::Onboarding,
            set: None,
            profile: None,
            pending: None,
            diagnostic_queue: VecDeque::new(),
            diagnostic_responses: Vec::new(),
            entry_tiers: BTreeMap::new(),
            history: SessionHistory::new(),
            outcomes: Vec::new(),
            started_at: Utc::now(),
            partial_persist: false,
        }
    }

    /// Override the generated session id.
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = session;
        self
    }

    /// Override the default framework builder.
    #[must_use]
    pub fn with_framework_builder(mut self, builder: FrameworkBuilder) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The activity awaiting a submission, if any.
    #[must_use]
    pub fn current_activity(&self) -> Option<&Activity> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&LearnerProfile> {
        self.profile.as_ref()
    }

    /// Start the session for a declared domain.
    ///
    /// Builds and persists the competency framework, then either queues
    /// the diagnostic (new learner) or schedules practice directly
    /// (returning learner). Returns the first activity, or `None` when a
    /// returning learner already meets coverage everywhere.
    ///
    /// A too-vague domain is surfaced for re-prompt without consuming the
    /// session; a framework persistence failure closes it.
    pub async fn begin(
        &mut self,
        domain_name: &str,
        constraints: &FrameworkConstraints,
    ) -> Result<Option<Activity>> {
        if self.phase != Phase::Onboarding {
            return Err(EngineError::InvalidPhaseTransition {
                from: self.phase.as_str().to_string(),
                to: Phase::Diagnostic.as_str().to_string(),
            });
        }

        // Reuse a previously persisted framework for this domain so the
        // learner's profile keys stay stable across sessions.
        let loaded = match FrameworkBuilder::load(self.store.as_ref(), domain_name).await {
            Ok(set) => set,
            Err(err) => {
                warn!(error = %err, "framework lookup failed, generating fresh");
                None
            }
        };
        let set = match loaded {
            Some(set) => {
                info!(domain = %set.framework.domain_name, "reusing persisted framework");
                set
            }
            None => match self
                .builder
                .build(self.store.as_ref(), domain_name, constraints)
                .await
            {
                Ok(set) => set,
                Err(err @ EngineError::DomainTooVague(_)) => return Err(err),
                Err(err) => {
                    self.phase.transition(Phase::Closed)?;
                    return Err(err);
                }
            },
        };

        let start = Observation::new(
            self.session.clone(),
            Actor::System,
            ObservationKind::State,
            json!({
                "event": "session_start",
                "domain": set.framework.domain_name,
                "learner": self.learner.as_str(),
            }),
        )
        .with_tags(vec!["session_start".to_string()]);
        if let Err(err) = self
            .store
            .add_observations(
                IdempotencyKey::new(format!("session_start:{}", self.session)),
                vec![start],
            )
            .await
        {
            warn!(error = %err, "failed to record session start");
            self.partial_persist = true;
        }

        let recent = match SessionHistory::load_recent_items(
            self.store.as_ref(),
            &self.session,
            self.policy.history_window_sessions,
        )
        .await
        {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "failed to load recent item history");
                HashSet::new()
            }
        };
        self.history = SessionHistory::new().with_recent_items(recent);

        let existing = match self.store.get_profile(&self.learner, set.framework.domain).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "profile lookup failed, treating learner as new");
                self.partial_persist = true;
                None
            }
        };

        self.set = Some(set);
        if let Some(mut profile) = existing {
            if profile.archived {
                profile.archived = false;
                match self.store.put_profile(&profile, profile.version).await {
                    Ok(version) => profile.version = version,
                    Err(err) => {
                        warn!(error = %err, "failed to reactivate archived profile");
                        self.partial_persist = true;
                    }
                }
            }
            info!(learner = %self.learner, "returning learner, skipping diagnostic");
            self.entry_tiers = profile.progress.iter().map(|(id, p)| (*id, p.tier)).collect();
            self.profile = Some(profile);
            self.phase.transition(Phase::Practice)?;
            if self.schedule_next()? {
                return Ok(self.pending.clone());
            }
            return Ok(None);
        }

        let mut plan: VecDeque<AssessmentItem> = match self.set.as_ref() {
            Some(set) => self.diagnostic.plan(set).into(),
            None => VecDeque::new(),
        };
        let Some(first) = plan.pop_front() else {
            self.phase.transition(Phase::WrapUp)?;
            return Ok(None);
        };
        self.diagnostic_queue = plan;
        let activity = self.activity_for_item(&first);
        self.history.record_probe(&activity);
        self.pending = Some(activity.clone());
        self.phase.transition(Phase::Diagnostic)?;
        info!(
            session = %self.session,
            items = self.diagnostic_queue.len() + 1,
            "diagnostic started"
        );
        Ok(Some(activity))
    }

    /// Submit the learner's response to the pending activity.
    ///
    /// Verifies and finalizes the activity, records progress, and
    /// schedules the next one. Adapter failures never abort the session:
    /// the verdict degrades to inconclusive and the loop continues.
    pub async fn submit(&mut self, response: LearnerResponse) -> Result<TurnOutcome> {
        if self.phase == Phase::Closed {
            return Err(EngineError::SessionClosed);
        }
        let mut activity = self.pending.take().ok_or(EngineError::NoPendingActivity)?;
        if activity.finalized {
            return Err(EngineError::ActivityAlreadyFinalized(activity.id));
        }
        activity.prediction = response.prediction.clone();
        activity.reflection = response.reflection.clone();

        let spec = self.set.as_ref().and_then(|set| {
            activity
                .item
                .and_then(|id| set.bank.item(id))
                .and_then(|item| item.verification.clone())
        });
        let outcome = self.score(&response, spec.as_ref()).await;
        let verdict = outcome.verdict;
        let detail = outcome.detail.clone();
        activity.verification = Some(outcome);
        activity.finalized = true;

        let in_diagnostic = self.phase == Phase::Diagnostic;
        self.persist_activity(&activity, verdict, &detail, &response, in_diagnostic)
            .await;
        self.outcomes.push(ActivityOutcome {
            activity: activity.id,
            competency: activity.competency,
            verdict,
        });

        let (tier_change, reinforce, session_complete) = if in_diagnostic {
            self.diagnostic_responses.push((activity.competency, verdict));
            if let Some(item) = self.diagnostic_queue.pop_front() {
                let next = self.activity_for_item(&item);
                self.history.record_probe(&next);
                self.pending = Some(next);
                (None, false, false)
            } else {
                let has_next = self.complete_diagnostic().await?;
                (None, false, !has_next)
            }
        } else {
            let (tier_change, reinforce) = self.record_progress(&activity, verdict).await?;
            let has_next = self.schedule_next()?;
            (tier_change, reinforce, !has_next)
        };

        Ok(TurnOutcome {
            activity,
            verdict,
            tier_change,
            reinforce,
            session_complete,
        })
    }

    /// End the session: build, persist and return the wrap-up summary,
    /// then archive the profile until the next session resumes it.
    ///
    /// Legal from any open phase. Stopping during onboarding returns an
    /// empty summary and persists nothing.
    pub async fn stop(&mut self) -> Result<SessionSummary> {
        match self.phase {
            Phase::Closed => return Err(EngineError::SessionClosed),
            Phase::WrapUp => {}
            _ => self.phase.transition(Phase::WrapUp)?,
        }
        self.pending = None;

        let Some(set) = self.set.as_ref() else {
            self.phase.transition(Phase::Closed)?;
            return Ok(SessionSummary {
                session: self.session.clone(),
                domain: DomainId::from(uuid::Uuid::nil()),
                domain_name: String::new(),
                competencies: Vec::new(),
                activities: Vec::new(),
                duration_secs: self.elapsed_secs(),
                recommendation: Recommendation::ContinuePractice,
                partial_persist: false,
            });
        };

        let profile = match self.profile.clone() {
            Some(profile) => profile,
            None => LearnerProfile::new(self.learner.clone(), set.framework.domain),
        };
        let competencies: Vec<CompetencySummary> = set
            .framework
            .active()
            .map(|c| CompetencySummary {
                competency: c.id,
                name: c.name.clone(),
                entry_tier: self.entry_tiers.get(&c.id).copied().unwrap_or_default(),
                exit_tier: profile.tier_for(c.id),
            })
            .collect();
        let recommendation = self.recommendation(set, &profile);

        let mut summary = SessionSummary {
            session: self.session.clone(),
            domain: set.framework.domain,
            domain_name: set.framework.domain_name.clone(),
            competencies,
            activities: self.outcomes.clone(),
            duration_secs: self.elapsed_secs(),
            recommendation,
            partial_persist: self.partial_persist,
        };

        if let Err(err) = self.persist_summary(&summary).await {
            warn!(error = %err, "failed to persist session summary");
            summary.partial_persist = true;
        }
        if !self.archive_profile().await {
            summary.partial_persist = true;
        }

        self.phase.transition(Phase::Closed)?;
        info!(
            session = %summary.session,
            activities = summary.activities.len(),
            recommendation = summary.recommendation.as_str(),
            "session closed"
        );
        Ok(summary)
    }

    fn activity_for_item(&self, item: &AssessmentItem) -> Activity {
        Activity::new(
            self.session.clone(),
            item.competency,
            Some(item.id),
            item.tier,
            item.prompt.clone(),
            REFLECTION_PROMPT,
        )
    }

    fn elapsed_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Score a response against the item's verification spec, degrading
    /// adapter failures to an inconclusive verdict.
    async fn score(
        &self,
        response: &LearnerResponse,
        spec: Option<&VerificationSpec>,
    ) -> VerificationOutcome {
        match spec {
            Some(VerificationSpec::Command { template, expected_stdout }) => {
                let command = template.replace("{answer}", &response.answer);
                match self.run_command(&command).await {
                    Ok(output) => verify::score_command(expected_stdout.as_deref(), &output),
                    Err(err) => Self::degrade(err),
                }
            }
            Some(VerificationSpec::Fixture { path, expected_content }) => {
                match self.read_fixture(Path::new(path)).await {
                    Ok(content) => verify::score_fixture(expected_content, &content),
                    Err(err) => Self::degrade(err),
                }
            }
            None => match response.self_score {
                Some(score) => VerificationOutcome {
                    verdict: score.as_verdict(),
                    output: None,
                    detail: "self-scored".to_string(),
                },
                None => VerificationOutcome::inconclusive("no mechanical verification available"),
            },
        }
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let timeout = self.policy.command_timeout();
        match self.verifier.execute_command(command, timeout).await {
            Err(VerifyError::Unavailable(reason)) => {
                warn!(%reason, "verifier unavailable, retrying once");
                tokio::time::sleep(self.policy.tool_retry_backoff()).await;
                self.verifier
                    .execute_command(command, timeout)
                    .await
                    .map_err(Self::exhausted)
            }
            other => Ok(other?),
        }
    }

    async fn read_fixture(&self, path: &Path) -> Result<String> {
        match self.verifier.read_file(path).await {
            Err(VerifyError::Unavailable(reason)) => {
                warn!(%reason, "verifier unavailable, retrying once");
                tokio::time::sleep(self.policy.tool_retry_backoff()).await;
                self.verifier.read_file(path).await.map_err(Self::exhausted)
            }
            other => Ok(other?),
        }
    }

    /// Still unavailable on the retry becomes the terminal tool error.
    fn exhausted(err: VerifyError) -> EngineError {
        match err {
            VerifyError::Unavailable(reason) => EngineError::ToolUnavailable(reason),
            other => EngineError::Verify(other),
        }
    }

    fn degrade(err: EngineError) -> VerificationOutcome {
        let detail = match &err {
            EngineError::ToolUnavailable(reason) => {
                format!("tool unavailable after retry: {reason}")
            }
            EngineError::Verify(VerifyError::Timeout(limit)) => {
                format!("verification timed out after {}s", limit.as_secs())
            }
            EngineError::Verify(
                VerifyError::PathNotAllowed(_) | VerifyError::CommandNotAllowed(_),
            ) => {
                format!("verification blocked by sandbox policy: {err}")
            }
            _ => format!("verification failed: {err}"),
        };
        warn!(%detail, "verification degraded to inconclusive");
        VerificationOutcome::inconclusive(detail)
    }

    /// Finalize the activity entity plus its observations in one
    /// idempotent write. Store failure flags partial persistence and the
    /// session continues.
    async fn persist_activity(
        &mut self,
        activity: &Activity,
        verdict: Verdict,
        detail: &str,
        response: &LearnerResponse,
        in_diagnostic: bool,
    ) {
        let tag = |obs: Observation| {
            if in_diagnostic {
                obs.with_tags(vec!["diagnostic".to_string()])
            } else {
                obs
            }
        };

        let mut observations = vec![
            tag(Observation::new(
                self.session.clone(),
                Actor::Learner,
                ObservationKind::Submission,
                json!({ "answer": response.answer, "prediction": response.prediction }),
            )
            .with_activity(activity.id)
            .with_competency(activity.competency)),
            tag(Observation::verify(
                self.session.clone(),
                activity.id,
                activity.competency,
                verdict,
                detail,
            )),
        ];
        if let Some(reflection) = &response.reflection {
            observations.push(tag(Observation::new(
                self.session.clone(),
                Actor::Learner,
                ObservationKind::Reflection,
                json!({ "reflection": reflection }),
            )
            .with_activity(activity.id)
            .with_competency(activity.competency)));
        }

        let data = match serde_json::to_value(activity) {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "failed to serialize activity");
                self.partial_persist = true;
                return;
            }
        };
        let entity = Entity::new(
            EntityKind::Activity,
            activity.id,
            format!("activity {}", activity.id),
            data,
        );
        let relations = vec![Relation::new(
            entity.id.clone(),
            RelationKind::Targets,
            EntityKind::Competency.entity_id(activity.competency),
        )];

        if let Err(err) = self
            .store
            .finalize_activity(
                IdempotencyKey::finalize(activity.id),
                entity,
                observations,
                relations,
            )
            .await
        {
            warn!(error = %err, activity = %activity.id, "failed to persist activity");
            self.partial_persist = true;
        }
    }

    /// Place the learner from the collected diagnostic verdicts and move
    /// to practice. Returns whether a practice activity was scheduled.
    ///
    /// A write conflict means another session owns the stored profile;
    /// the placement re-reads it and only fills competencies it lacks,
    /// retried up to the configured count.
    async fn complete_diagnostic(&mut self) -> Result<bool> {
        let placement = self.diagnostic.place(&self.diagnostic_responses);
        let mut profile = match self.set.as_ref() {
            Some(set) => self
                .diagnostic
                .build_profile(self.learner.clone(), set, &placement),
            None => return Err(EngineError::NoPendingActivity),
        };
        let mut attempts = 0u32;
        loop {
            match self.store.put_profile(&profile, profile.version).await {
                Ok(version) => {
                    profile.version = version;
                    break;
                }
                Err(StoreError::WriteConflict { key, expected, actual })
                    if attempts < self.policy.cas_retries =>
                {
                    attempts += 1;
                    warn!(%key, expected, actual, attempt = attempts, "placement write conflict, retrying");
                    match self.store.get_profile(&self.learner, profile.domain).await {
                        Ok(Some(current)) => profile = Self::adopt_placement(current, profile),
                        Ok(None) => profile.version = 0,
                        Err(err) => {
                            warn!(error = %err, "failed to re-read profile during placement");
                            self.partial_persist = true;
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to persist initial placement");
                    self.partial_persist = true;
                    break;
                }
            }
        }
        self.entry_tiers = profile.progress.iter().map(|(id, p)| (*id, p.tier)).collect();

        let metric = Observation::new(
            self.session.clone(),
            Actor::Engine,
            ObservationKind::Metric,
            json!({
                "event": "placement",
                "overall": placement.overall.as_str(),
                "rationale": placement.rationale,
            }),
        )
        .with_tags(vec!["diagnostic".to_string(), "placement".to_string()]);
        if let Err(err) = self
            .store
            .add_observations(
                IdempotencyKey::new(format!("placement:{}", self.session)),
                vec![metric],
            )
            .await
        {
            warn!(error = %err, "failed to record placement");
            self.partial_persist = true;
        }

        info!(overall = %placement.overall, "diagnostic complete");
        self.profile = Some(profile);
        self.phase.transition(Phase::Practice)?;
        self.schedule_next()
    }

    /// Fold the verdict into the persisted profile. Exhausted conflict
    /// retries or a store outage fall back to the in-memory profile so
    /// scheduling still adapts, with the summary flagged.
    async fn record_progress(
        &mut self,
        activity: &Activity,
        verdict: Verdict,
    ) -> Result<(Option<TierChange>, bool)> {
        let domain = match self.set.as_ref() {
            Some(set) => set.framework.domain,
            None => return Err(EngineError::NoPendingActivity),
        };
        match self
            .tracker
            .record(self.store.as_ref(), &self.learner, domain, activity, verdict)
            .await
        {
            Ok(update) => {
                self.profile = Some(update.profile);
                Ok((update.tier_change, update.reinforce))
            }
            Err(err) => {
                warn!(error = %err, "failed to persist progress, applying locally");
                self.partial_persist = true;
                let profile = match self.profile.as_mut() {
                    Some(profile) => profile,
                    None => return Err(EngineError::NoPendingActivity),
                };
                let effect = profile.progress_mut(activity.competency).apply(
                    verdict,
                    self.policy.promote_streak,
                    self.policy.demote_streak,
                );
                Ok(match effect {
                    ProgressEffect::Promoted { from, to }
                    | ProgressEffect::Demoted { from, to } => (
                        Some(TierChange {
                            competency: activity.competency,
                            activity: activity.id,
                            from,
                            to,
                            at: Utc::now(),
                        }),
                        false,
                    ),
                    ProgressEffect::Reinforce => (None, true),
                    ProgressEffect::None => (None, false),
                })
            }
        }
    }

    /// Ask the scheduler for the next activity. Returns false after
    /// transitioning to wrap-up when the session is complete.
    fn schedule_next(&mut self) -> Result<bool> {
        let schedule = match (self.set.as_ref(), self.profile.as_ref()) {
            (Some(set), Some(profile)) => {
                self.scheduler
                    .next_activity(&self.session, set, profile, &self.history)
            }
            _ => return Err(EngineError::NoPendingActivity),
        };
        match schedule {
            Schedule::Next(activity) => {
                self.history.record(&activity);
                self.pending = Some(activity);
                Ok(true)
            }
            Schedule::SessionComplete => {
                self.phase.transition(Phase::WrapUp)?;
                Ok(false)
            }
        }
    }

    /// Wrap-up recommendation from coverage and tiers across active
    /// competencies.
    fn recommendation(&self, set: &FrameworkSet, profile: &LearnerProfile) -> Recommendation {
        let mut any = false;
        let mut all_advanced = true;
        let mut all_intermediate = true;
        for competency in set.framework.active() {
            any = true;
            let Some(progress) = profile.progress.get(&competency.id) else {
                return Recommendation::ContinuePractice;
            };
            if progress.observations < self.policy.min_observations {
                return Recommendation::ContinuePractice;
            }
            all_advanced &= progress.tier >= Tier::Advanced;
            all_intermediate &= progress.tier >= Tier::Intermediate;
        }
        if !any {
            Recommendation::ContinuePractice
        } else if all_advanced {
            Recommendation::Advance
        } else if all_intermediate {
            Recommendation::ReadinessCheck
        } else {
            Recommendation::ContinuePractice
        }
    }

    /// A concurrent writer got to the profile first; keep its progress
    /// and add only the competencies the placement saw that it lacks.
    fn adopt_placement(mut current: LearnerProfile, placement: LearnerProfile) -> LearnerProfile {
        for (competency, progress) in placement.progress {
            current.progress.entry(competency).or_insert(progress);
        }
        if current.placement_rationale.is_none() {
            current.placement_rationale = placement.placement_rationale;
        }
        current
    }

    /// Mark the stored profile archived. Conflicts re-read the stored
    /// copy so a concurrent update is not overwritten. Returns false when
    /// the flag could not be persisted.
    async fn archive_profile(&mut self) -> bool {
        let Some(profile) = self.profile.as_mut() else {
            return true;
        };
        profile.archived = true;
        let mut attempts = 0u32;
        loop {
            match self.store.put_profile(profile, profile.version).await {
                Ok(version) => {
                    profile.version = version;
                    return true;
                }
                Err(StoreError::WriteConflict { key, expected, actual })
                    if attempts < self.policy.cas_retries =>
                {
                    attempts += 1;
                    warn!(%key, expected, actual, attempt = attempts, "archive write conflict, retrying");
                    match self.store.get_profile(&self.learner, profile.domain).await {
                        Ok(Some(mut current)) => {
                            current.archived = true;
                            *profile = current;
                        }
                        Ok(None) => profile.version = 0,
                        Err(err) => {
                            warn!(error = %err, "failed to re-read profile while archiving");
                            return false;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to archive profile");
                    return false;
                }
            }
        }
    }

    async fn persist_summary(&self, summary: &SessionSummary) -> std::result::Result<(), StoreError> {
        let entity = Entity::new(
            EntityKind::SessionSummary,
            &self.session,
            format!("session {}", self.session),
            serde_json::to_value(summary)?,
        );
        let relations: Vec<Relation> = summary
            .activities
            .iter()
            .map(|outcome| {
                Relation::new(
                    entity.id.clone(),
                    RelationKind::Includes,
                    EntityKind::Activity.entity_id(outcome.activity),
                )
            })
            .collect();
        self.store.create_entities(vec![entity]).await?;
        self.store.create_relations(relations).await?;
        Ok(())
    }
}
