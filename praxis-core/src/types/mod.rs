//! Core types shared across the engine and storage layers

mod activity;
mod framework;
mod graph;
mod ids;
mod observation;
mod profile;
mod summary;
mod tier;

pub use activity::{Activity, CommandOutput, Verdict, VerificationOutcome};
pub use framework::{
    AssessmentBank, AssessmentItem, Competency, CompetencyFramework, FrameworkSet, GuideEntry,
    PreparationGuide, VerificationSpec,
};
pub use graph::{Entity, EntityId, EntityKind, IdempotencyKey, Relation, RelationKind};
pub use ids::{ActivityId, CompetencyId, DomainId, ItemId, LearnerId, ObservationId, SessionId};
pub use observation::{Actor, Observation, ObservationKind, Score};
pub use profile::{replay_progress, CompetencyProgress, LearnerProfile, ProgressEffect, TierChange};
pub use summary::{ActivityOutcome, CompetencySummary, Recommendation, SessionSummary};
pub use tier::Tier;
