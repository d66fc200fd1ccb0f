//! The four-point proficiency scale.

use serde::{Deserialize, Serialize};

/// Proficiency tier, totally ordered from Foundational up to Expert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Foundational,
    Intermediate,
    Advanced,
    Expert,
}

impl Tier {
    /// All tiers in ascending order.
    pub const ALL: [Tier; 4] = [
        Tier::Foundational,
        Tier::Intermediate,
        Tier::Advanced,
        Tier::Expert,
    ];

    /// Position on the four-point scale (0..=3).
    #[must_use]
    pub fn ordinal(&self) -> i32 {
        match self {
            Self::Foundational => 0,
            Self::Intermediate => 1,
            Self::Advanced => 2,
            Self::Expert => 3,
        }
    }

    /// Tier for an ordinal, clipped to the defined scale.
    #[must_use]
    pub fn from_ordinal(ordinal: i32) -> Self {
        match ordinal {
            i32::MIN..=0 => Self::Foundational,
            1 => Self::Intermediate,
            2 => Self::Advanced,
            _ => Self::Expert,
        }
    }

    /// One tier up, saturating at Expert.
    #[must_use]
    pub fn step_up(&self) -> Self {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// One tier down, saturating at Foundational.
    #[must_use]
    pub fn step_down(&self) -> Self {
        Self::from_ordinal(self.ordinal() - 1)
    }

    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foundational => "foundational",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "foundational" => Some(Self::Foundational),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
