//! Framework builder: decomposes a declared domain into a competency
//! framework, assessment bank and preparation guide, and persists them.
//!
//! The natural-language side of decomposition is an external collaborator
//! behind `DomainDecomposer`; the built-in `TemplateDecomposer` produces a
//! deterministic facet breakdown so the engine is fully testable without
//! one.

use serde::{Deserialize, Serialize};
use tracing::info;

use praxis_core::{
    AssessmentBank, AssessmentItem, Competency, CompetencyFramework, CompetencyId, DomainId,
    Entity, EntityKind, FrameworkSet, GuideEntry, ItemId, PreparationGuide, Relation,
    RelationKind, Tier, VerificationSpec,
};
use praxis_store::GraphStore;

use crate::error::{EngineError, Result};

/// Optional constraints on framework generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_minutes: Option<u32>,
    /// Cap on competencies, clamped to the supported 2..=8 range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_competencies: Option<usize>,
}

/// One proposed competency, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetencySeed {
    pub name: String,
    pub description: String,
    pub max_tier: Tier,
}

/// Decomposes a free-text domain into competency seeds.
pub trait DomainDecomposer: Send + Sync {
    /// Propose 2..=8 distinct competencies for the domain, or fail with
    /// `DomainTooVague`.
    fn decompose(
        &self,
        domain_name: &str,
        constraints: &FrameworkConstraints,
    ) -> Result<Vec<CompetencySeed>>;
}

/// Facet archetypes applied to any concrete domain.
const FACETS: [(&str, &str); 4] = [
    ("fundamentals", "Core concepts and vocabulary"),
    ("everyday workflow", "Routine application in day-to-day work"),
    (
        "failure modes and recovery",
        "Diagnosing problems and recovering from them",
    ),
    ("tooling and inspection", "Inspecting state and automating checks"),
];

/// Deterministic default decomposer.
///
/// Splits a domain into fixed facet competencies. A domain is too vague
/// when it carries fewer than three alphabetic characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDecomposer;

impl DomainDecomposer for TemplateDecomposer {
    fn decompose(
        &self,
        domain_name: &str,
        constraints: &FrameworkConstraints,
    ) -> Result<Vec<CompetencySeed>> {
        let name = domain_name.trim();
        if name.chars().filter(|c| c.is_alphabetic()).count() < 3 {
            return Err(EngineError::DomainTooVague(name.to_string()));
        }

        let max = constraints.max_competencies.unwrap_or(4).clamp(2, 8);
        Ok(FACETS
            .iter()
            .take(max)
            .map(|(facet, description)| CompetencySeed {
                name: format!("{name}: {facet}"),
                description: format!("{description} for {name}"),
                max_tier: Tier::Expert,
            })
            .collect())
    }
}

fn item_prompt(competency: &str, tier: Tier, variant: usize) -> String {
    let templates: [&str; 2] = match tier {
        Tier::Foundational => [
            "Define the key terms of {c} and give one concrete example.",
            "Explain {c} to a newcomer in three sentences.",
        ],
        Tier::Intermediate => [
            "Walk through how you would apply {c} on a small task, step by step.",
            "Predict the outcome of a typical {c} operation, then check it.",
        ],
        Tier::Advanced => [
            "Diagnose a subtle failure involving {c} and justify your fix.",
            "Compare two approaches to {c} and argue when each is the right call.",
        ],
        Tier::Expert => [
            "Design a team policy around {c} and defend its trade-offs.",
            "Critique a flawed real-world use of {c} and propose a correction.",
        ],
    };
    templates[variant % templates.len()].replace("{c}", competency)
}

/// Attaches a mechanical verification spec to a generated item, keyed by
/// competency name, tier and variant index. `None` leaves the item
/// self-scored.
pub type VerificationProvider =
    dyn Fn(&str, Tier, usize) -> Option<VerificationSpec> + Send + Sync;

/// Generates and persists the framework, bank and guide for a domain.
pub struct FrameworkBuilder {
    decomposer: Box<dyn DomainDecomposer>,
    /// Item variants per (competency, tier) cell, clamped to 2..=4.
    variants_per_cell: usize,
    verification: Option<Box<VerificationProvider>>,
}

impl Default for FrameworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameworkBuilder {
    /// Builder with the deterministic template decomposer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decomposer: Box::new(TemplateDecomposer),
            variants_per_cell: 2,
            verification: None,
        }
    }

    /// Builder with a caller-supplied decomposer.
    #[must_use]
    pub fn with_decomposer(decomposer: Box<dyn DomainDecomposer>) -> Self {
        Self {
            decomposer,
            variants_per_cell: 2,
            verification: None,
        }
    }

    /// Override the variant count per (competency, tier) cell.
    #[must_use]
    pub fn with_variants_per_cell(mut self, variants: usize) -> Self {
        self.variants_per_cell = variants.clamp(2, 4);
        self
    }

    /// Attach mechanical verification specs to generated items.
    #[must_use]
    pub fn with_verification(mut self, provider: Box<VerificationProvider>) -> Self {
        self.verification = Some(provider);
        self
    }

    /// Generate the framework set without persisting it.
    pub fn generate(
        &self,
        domain_name: &str,
        constraints: &FrameworkConstraints,
    ) -> Result<FrameworkSet> {
        let seeds = self.decomposer.decompose(domain_name, constraints)?;
        if seeds.len() < 2 {
            return Err(EngineError::DomainTooVague(domain_name.trim().to_string()));
        }

        let domain = DomainId::new();
        let mut competencies = Vec::with_capacity(seeds.len());
        let mut items = Vec::new();
        let mut entries = Vec::new();

        for (order, seed) in seeds.into_iter().enumerate() {
            let competency = Competency {
                id: CompetencyId::new(),
                domain,
                name: seed.name,
                description: seed.description,
                order,
                max_tier: seed.max_tier,
                active: true,
            };

            for tier in Tier::ALL {
                if tier > competency.max_tier {
                    break;
                }
                let mut variants = Vec::with_capacity(self.variants_per_cell);
                for variant in 0..self.variants_per_cell {
                    let item = AssessmentItem {
                        id: ItemId::new(),
                        competency: competency.id,
                        tier,
                        prompt: item_prompt(&competency.name, tier, variant),
                        expected_insight: format!(
                            "Shows {tier}-level command of {}",
                            competency.name
                        ),
                        verification: self
                            .verification
                            .as_ref()
                            .and_then(|provider| provider(&competency.name, tier, variant)),
                    };
                    variants.push(item.id);
                    items.push(item);
                }
                entries.push(GuideEntry {
                    competency: competency.id,
                    tier,
                    variants,
                });
            }
            competencies.push(competency);
        }

        Ok(FrameworkSet {
            framework: CompetencyFramework {
                domain,
                domain_name: domain_name.trim().to_string(),
                competencies,
                created_at: chrono::Utc::now(),
            },
            bank: AssessmentBank { items },
            guide: PreparationGuide { entries },
        })
    }

    /// Load the persisted framework set for a domain name, if one exists.
    /// Matching is case-insensitive on the trimmed name.
    pub async fn load(
        store: &dyn GraphStore,
        domain_name: &str,
    ) -> Result<Option<FrameworkSet>> {
        let graph = store.read_graph().await?;
        let wanted = domain_name.trim().to_lowercase();
        for entity in graph.entities.iter().filter(|e| e.kind == EntityKind::Domain) {
            let Ok(set) = serde_json::from_value::<FrameworkSet>(entity.data.clone()) else {
                continue;
            };
            if set.framework.domain_name.trim().to_lowercase() == wanted {
                return Ok(Some(set));
            }
        }
        Ok(None)
    }

    /// Generate and persist. A store failure here is fatal to session
    /// start: no silent partial framework.
    pub async fn build(
        &self,
        store: &dyn GraphStore,
        domain_name: &str,
        constraints: &FrameworkConstraints,
    ) -> Result<FrameworkSet> {
        let set = self.generate(domain_name, constraints)?;
        self.persist(store, &set, &[]).await?;
        info!(
            domain = %set.framework.domain_name,
            competencies = set.framework.competencies.len(),
            items = set.bank.items.len(),
            "framework built and persisted"
        );
        Ok(set)
    }

    /// Regenerate the framework for an existing domain.
    ///
    /// Old competencies are marked inactive (never deleted) and each new
    /// competency supersedes its positional predecessor.
    pub async fn regenerate(
        &self,
        store: &dyn GraphStore,
        old: &FrameworkSet,
        constraints: &FrameworkConstraints,
    ) -> Result<FrameworkSet> {
        let mut set = self.generate(&old.framework.domain_name, constraints)?;
        set.framework.domain = old.framework.domain;
        for competency in &mut set.framework.competencies {
            competency.domain = old.framework.domain;
        }

        let mut retired = Vec::new();
        let mut supersedes = Vec::new();
        for old_comp in old.framework.active() {
            let mut inactive = old_comp.clone();
            inactive.active = false;
            if let Some(new_comp) = set
                .framework
                .competencies
                .iter()
                .find(|c| c.order == old_comp.order)
            {
                supersedes.push(Relation::new(
                    EntityKind::Competency.entity_id(new_comp.id),
                    RelationKind::Supersedes,
                    EntityKind::Competency.entity_id(old_comp.id),
                ));
            }
            retired.push(competency_entity(&inactive));
        }

        store
            .create_entities(retired)
            .await
            .map_err(EngineError::FrameworkPersistFailed)?;
        self.persist(store, &set, &supersedes).await?;
        info!(domain = %set.framework.domain_name, "framework regenerated");
        Ok(set)
    }

    async fn persist(
        &self,
        store: &dyn GraphStore,
        set: &FrameworkSet,
        extra_relations: &[Relation],
    ) -> Result<()> {
        // The domain entity carries the full set so later sessions for the
        // same domain reuse it instead of minting a new framework.
        let mut entities = vec![Entity::new(
            EntityKind::Domain,
            set.framework.domain,
            &set.framework.domain_name,
            serde_json::to_value(set).map_err(praxis_store::StoreError::from)?,
        )];
        let mut relations: Vec<Relation> = extra_relations.to_vec();

        for competency in &set.framework.competencies {
            entities.push(competency_entity(competency));
        }
        for item in &set.bank.items {
            entities.push(Entity::new(
                EntityKind::AssessmentItem,
                item.id,
                format!("{} [{}]", item.prompt, item.tier),
                serde_json::to_value(item).map_err(praxis_store::StoreError::from)?,
            ));
            relations.push(Relation::new(
                EntityKind::Competency.entity_id(item.competency),
                RelationKind::HasItem,
                EntityKind::AssessmentItem.entity_id(item.id),
            ));
        }
        entities.push(Entity::new(
            EntityKind::PreparationGuide,
            set.framework.domain,
            format!("guide for {}", set.framework.domain_name),
            serde_json::to_value(&set.guide).map_err(praxis_store::StoreError::from)?,
        ));

        store
            .create_entities(entities)
            .await
            .map_err(EngineError::FrameworkPersistFailed)?;
        store
            .create_relations(relations)
            .await
            .map_err(EngineError::FrameworkPersistFailed)?;
        Ok(())
    }
}

fn competency_entity(competency: &Competency) -> Entity {
    Entity::new(
        EntityKind::Competency,
        competency.id,
        &competency.name,
        serde_json::to_value(competency).unwrap_or_default(),
    )
}
