//! Competency framework, assessment bank and preparation guide.
//!
//! These three structures are generated together for a newly declared
//! domain and persisted as a unit. Competencies are never deleted; a
//! regenerated framework marks the old ones inactive and links them with
//! a supersedes relation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CompetencyId, DomainId, ItemId};
use super::tier::Tier;

/// One competency within a domain's framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: CompetencyId,
    pub domain: DomainId,
    pub name: String,
    pub description: String,
    /// Declaration order within the framework; used for scheduler tie-breaks.
    pub order: usize,
    /// Highest tier this competency defines items for.
    pub max_tier: Tier,
    /// False once superseded by a regenerated framework.
    pub active: bool,
}

/// How an item's expected outcome can be checked mechanically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum VerificationSpec {
    /// Run a command and compare its stdout against an expected value.
    Command {
        template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_stdout: Option<String>,
    },
    /// Inspect a file fixture and compare its content.
    Fixture {
        path: String,
        expected_content: String,
    },
}

/// One immutable assessment item in the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentItem {
    pub id: ItemId,
    pub competency: CompetencyId,
    pub tier: Tier,
    pub prompt: String,
    /// What a strong answer demonstrates; used for rubric comparison.
    pub expected_insight: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSpec>,
}

/// The generated competency framework for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyFramework {
    pub domain: DomainId,
    pub domain_name: String,
    pub competencies: Vec<Competency>,
    pub created_at: DateTime<Utc>,
}

impl CompetencyFramework {
    /// Active competencies in declaration order.
    pub fn active(&self) -> impl Iterator<Item = &Competency> {
        self.competencies.iter().filter(|c| c.active)
    }

    /// Look up a competency by id.
    #[must_use]
    pub fn competency(&self, id: CompetencyId) -> Option<&Competency> {
        self.competencies.iter().find(|c| c.id == id)
    }
}

/// The generated set of assessment items for a framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentBank {
    pub items: Vec<AssessmentItem>,
}

impl AssessmentBank {
    /// Items for one competency at one tier, in bank order.
    pub fn items_for(
        &self,
        competency: CompetencyId,
        tier: Tier,
    ) -> impl Iterator<Item = &AssessmentItem> {
        self.items
            .iter()
            .filter(move |i| i.competency == competency && i.tier == tier)
    }

    /// Look up an item by id.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&AssessmentItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

/// Ordered variant list for one (competency, tier) cell of the guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideEntry {
    pub competency: CompetencyId,
    pub tier: Tier,
    /// Item ids in preferred presentation order.
    pub variants: Vec<ItemId>,
}

/// Preparation guide: the scheduler's source of ordered activity variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparationGuide {
    pub entries: Vec<GuideEntry>,
}

impl PreparationGuide {
    /// Variants for one (competency, tier) cell, if defined.
    #[must_use]
    pub fn variants(&self, competency: CompetencyId, tier: Tier) -> &[ItemId] {
        self.entries
            .iter()
            .find(|e| e.competency == competency && e.tier == tier)
            .map(|e| e.variants.as_slice())
            .unwrap_or(&[])
    }
}

/// Framework, bank and guide generated together for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSet {
    pub framework: CompetencyFramework,
    pub bank: AssessmentBank,
    pub guide: PreparationGuide,
}
