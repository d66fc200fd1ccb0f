//! End-to-end session flows against the in-memory store and the mock
//! verifier: placement, promotion, failure containment and wrap-up.

use std::collections::BTreeMap;
use std::sync::Arc;

use praxis_core::{
    replay_progress, CompetencyId, EnginePolicy, LearnerId, LearnerProfile, ObservationKind,
    Recommendation, Score, SessionId, Tier, Verdict, VerificationSpec,
};
use praxis_engine::{
    EngineError, FrameworkBuilder, FrameworkConstraints, LearnerResponse, MockVerifier, Phase,
    SessionOrchestrator,
};
use praxis_store::{GraphStore, MemoryGraphStore};

const DOMAIN: &str = "Git branching strategies";

/// Builder whose items all verify through a shell command; the mock
/// verifier then scripts pass (default), fail and timeout per submission.
fn command_verified_builder() -> FrameworkBuilder {
    FrameworkBuilder::new().with_verification(Box::new(|competency, tier, variant| {
        Some(VerificationSpec::Command {
            template: format!("assess --competency '{competency}' --tier {tier} --variant {variant} -- {{answer}}"),
            expected_stdout: None,
        })
    }))
}

fn orchestrator(
    store: Arc<MemoryGraphStore>,
    verifier: Arc<MockVerifier>,
    session: &str,
) -> SessionOrchestrator {
    SessionOrchestrator::new(store, verifier, LearnerId::new("alex"), EnginePolicy::default())
        .with_session(SessionId::new(session))
        .with_framework_builder(command_verified_builder())
}

async fn drain_diagnostic(
    orchestrator: &mut SessionOrchestrator,
    verifier: &MockVerifier,
    pass: bool,
) {
    while orchestrator.phase() == Phase::Diagnostic {
        if !pass {
            verifier.queue_output("", 1);
        }
        orchestrator
            .submit(LearnerResponse::new("diagnostic answer"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn failed_diagnostic_places_learner_at_foundational() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    let first = orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap()
        .expect("new learner starts with a diagnostic item");
    assert_eq!(orchestrator.phase(), Phase::Diagnostic);
    assert_eq!(first.tier, Tier::Foundational);

    drain_diagnostic(&mut orchestrator, &verifier, false).await;
    assert_eq!(orchestrator.phase(), Phase::Practice);

    let profile = orchestrator.profile().expect("placement built a profile");
    for progress in profile.progress.values() {
        assert_eq!(progress.tier, Tier::Foundational);
    }
    assert!(profile.placement_rationale.is_some());

    let next = orchestrator.current_activity().expect("practice scheduled");
    assert_eq!(next.tier, Tier::Foundational);

    // The placement survives in the store with a bumped version.
    let persisted = store
        .get_profile(&LearnerId::new("alex"), profile.domain)
        .await
        .unwrap()
        .expect("profile persisted at placement");
    assert_eq!(persisted.version, 1);
}

#[tokio::test]
async fn sustained_matches_promote_and_recommend_advancing() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    drain_diagnostic(&mut orchestrator, &verifier, true).await;

    // Every unscripted command exits 0, so every practice verdict matches.
    let mut promotions = Vec::new();
    while orchestrator.current_activity().is_some() {
        let outcome = orchestrator
            .submit(LearnerResponse::new("practice answer"))
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Match);
        if let Some(change) = outcome.tier_change {
            promotions.push(change);
        }
        if outcome.session_complete {
            break;
        }
    }

    assert!(!promotions.is_empty());
    assert!(promotions.iter().all(|c| c.to > c.from));

    let summary = orchestrator.stop().await.unwrap();
    assert_eq!(summary.recommendation, Recommendation::Advance);
    assert!(!summary.partial_persist);
    for competency in &summary.competencies {
        assert!(competency.exit_tier > competency.entry_tier);
    }
    assert_eq!(orchestrator.phase(), Phase::Closed);
}

#[tokio::test]
async fn verifier_timeout_degrades_to_inconclusive_and_moves_on() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    drain_diagnostic(&mut orchestrator, &verifier, true).await;

    let stalled_item = orchestrator
        .current_activity()
        .and_then(|a| a.item)
        .expect("practice activity has an item");
    let streaks_before: BTreeMap<CompetencyId, u32> = orchestrator
        .profile()
        .unwrap()
        .progress
        .iter()
        .map(|(id, p)| (*id, p.match_streak))
        .collect();

    verifier.queue_timeout();
    let outcome = orchestrator
        .submit(LearnerResponse::new("practice answer"))
        .await
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Inconclusive);
    assert!(outcome.tier_change.is_none());
    assert!(!outcome.session_complete);
    let detail = &outcome.activity.verification.as_ref().unwrap().detail;
    assert!(detail.contains("timed out"), "detail was {detail:?}");

    // Streaks are untouched and the stalled item is not re-presented.
    let profile = orchestrator.profile().unwrap();
    for (id, streak) in &streaks_before {
        assert_eq!(profile.progress[id].match_streak, *streak);
    }
    let next = orchestrator.current_activity().expect("session continues");
    assert_ne!(next.item, Some(stalled_item));
}

#[tokio::test]
async fn unavailable_verifier_is_retried_once_before_degrading() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut policy = EnginePolicy::default();
    policy.tool_retry_backoff_ms = 1;
    let mut orchestrator =
        SessionOrchestrator::new(store, verifier.clone(), LearnerId::new("alex"), policy)
            .with_session(SessionId::new("s1"))
            .with_framework_builder(command_verified_builder());

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    drain_diagnostic(&mut orchestrator, &verifier, true).await;
    let commands_before = verifier.executed_commands().len();

    // First attempt unavailable, retry succeeds.
    verifier.queue_unavailable("sandbox restarting");
    let outcome = orchestrator
        .submit(LearnerResponse::new("practice answer"))
        .await
        .unwrap();
    assert_eq!(outcome.verdict, Verdict::Match);

    // Unavailable twice in a row exhausts the retry.
    verifier.queue_unavailable("sandbox down");
    verifier.queue_unavailable("sandbox down");
    let outcome = orchestrator
        .submit(LearnerResponse::new("practice answer"))
        .await
        .unwrap();
    assert_eq!(outcome.verdict, Verdict::Inconclusive);
    let detail = &outcome.activity.verification.as_ref().unwrap().detail;
    assert!(
        detail.contains("tool unavailable after retry"),
        "detail was {detail:?}"
    );
    assert!(verifier.executed_commands().len() > commands_before);
}

#[tokio::test]
async fn stopping_mid_practice_wraps_up_with_continue_practice() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    drain_diagnostic(&mut orchestrator, &verifier, true).await;

    let diagnostic_count = EnginePolicy::default().diagnostic_item_count();
    for _ in 0..2 {
        orchestrator
            .submit(LearnerResponse::new("practice answer").with_reflection("it worked"))
            .await
            .unwrap();
    }

    let summary = orchestrator.stop().await.unwrap();
    assert_eq!(summary.recommendation, Recommendation::ContinuePractice);
    assert_eq!(summary.activities.len(), diagnostic_count + 2);
    assert!(summary.activities.iter().all(|o| o.verdict == Verdict::Match));
    assert!(!summary.domain_name.is_empty());

    // Stopped session rejects further turns.
    assert!(matches!(
        orchestrator.submit(LearnerResponse::new("late")).await,
        Err(EngineError::SessionClosed)
    ));
}

#[tokio::test]
async fn tiers_are_reproducible_from_the_observation_log() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    drain_diagnostic(&mut orchestrator, &verifier, true).await;

    let entry_tiers: BTreeMap<CompetencyId, Tier> = orchestrator
        .profile()
        .unwrap()
        .progress
        .iter()
        .map(|(id, p)| (*id, p.tier))
        .collect();

    // A mixed practice run: fail one activity, pass the rest.
    verifier.queue_output("", 1);
    for _ in 0..6 {
        if orchestrator.current_activity().is_none() {
            break;
        }
        orchestrator
            .submit(LearnerResponse::new("practice answer"))
            .await
            .unwrap();
    }

    let policy = EnginePolicy::default();
    let observations = store
        .observations_for_session(&SessionId::new("s1"))
        .await
        .unwrap();
    let practice: Vec<_> = observations
        .into_iter()
        .filter(|o| {
            o.kind == ObservationKind::Verify && !o.tags.contains(&"diagnostic".to_string())
        })
        .collect();
    assert!(!practice.is_empty());

    let replayed = replay_progress(
        &practice,
        &entry_tiers,
        policy.promote_streak,
        policy.demote_streak,
    );
    let profile = orchestrator.profile().unwrap();
    for (competency, progress) in &replayed {
        assert_eq!(
            progress.tier, profile.progress[competency].tier,
            "replayed tier diverged for {competency}"
        );
        assert_eq!(progress.observations, profile.progress[competency].observations);
    }
}

#[tokio::test]
async fn returning_learner_skips_diagnostic_and_keeps_tiers() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());

    let mut first = orchestrator(store.clone(), verifier.clone(), "s1");
    first.begin(DOMAIN, &FrameworkConstraints::default()).await.unwrap();
    drain_diagnostic(&mut first, &verifier, true).await;
    first
        .submit(LearnerResponse::new("practice answer"))
        .await
        .unwrap();
    first.stop().await.unwrap();

    // Closing the session archives the stored profile.
    let domain = first.profile().unwrap().domain;
    let parked = store
        .get_profile(&LearnerId::new("alex"), domain)
        .await
        .unwrap()
        .expect("profile survives the session");
    assert!(parked.archived);

    let mut second = orchestrator(store.clone(), verifier.clone(), "s2");
    let resumed = second
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();
    assert_eq!(second.phase(), Phase::Practice);
    assert!(resumed.is_some());

    // Same domain id, so the first session's placement carries over and
    // the profile is active again.
    let profile = second.profile().unwrap();
    assert!(profile.progress.values().any(|p| p.tier >= Tier::Intermediate));
    assert!(profile.version > parked.version);
    let reactivated = store
        .get_profile(&LearnerId::new("alex"), domain)
        .await
        .unwrap()
        .expect("profile survives resumption");
    assert!(!reactivated.archived);
}

#[tokio::test]
async fn placement_merges_with_a_concurrently_written_profile() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let mut orchestrator = orchestrator(store.clone(), verifier.clone(), "s1");

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();

    // Another writer claims the profile while the diagnostic is running.
    let set = FrameworkBuilder::load(store.as_ref(), DOMAIN)
        .await
        .unwrap()
        .expect("onboarding persisted the framework");
    let seeded = set.framework.active().next().unwrap().id;
    let mut competing = LearnerProfile::new(LearnerId::new("alex"), set.framework.domain);
    competing.progress_mut(seeded).tier = Tier::Expert;
    store.put_profile(&competing, 0).await.unwrap();

    drain_diagnostic(&mut orchestrator, &verifier, true).await;
    assert_eq!(orchestrator.phase(), Phase::Practice);

    // The placement retried against the stored version and kept the
    // competing entry instead of overwriting it.
    let profile = orchestrator.profile().unwrap();
    assert_eq!(profile.version, 2);
    assert_eq!(profile.progress[&seeded].tier, Tier::Expert);

    let summary = orchestrator.stop().await.unwrap();
    assert!(!summary.partial_persist);
}

#[tokio::test]
async fn self_scored_items_fall_back_to_the_learner_verdict() {
    let store = Arc::new(MemoryGraphStore::new());
    let verifier = Arc::new(MockVerifier::new());
    // Default builder emits items without mechanical verification.
    let mut orchestrator = SessionOrchestrator::new(
        store,
        verifier,
        LearnerId::new("alex"),
        EnginePolicy::default(),
    )
    .with_session(SessionId::new("s1"));

    orchestrator
        .begin(DOMAIN, &FrameworkConstraints::default())
        .await
        .unwrap();

    let scored = orchestrator
        .submit(LearnerResponse::new("answer").with_self_score(Score::Partial))
        .await
        .unwrap();
    assert_eq!(scored.verdict, Verdict::Inconclusive);

    let unscored = orchestrator
        .submit(LearnerResponse::new("answer"))
        .await
        .unwrap();
    assert_eq!(unscored.verdict, Verdict::Inconclusive);
    let detail = &unscored.activity.verification.as_ref().unwrap().detail;
    assert!(detail.contains("no mechanical verification"));
}
