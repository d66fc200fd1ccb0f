//! Tunable scheduling and progression policy.
//!
//! Loaded from TOML with per-field defaults, so a partial config file only
//! overrides what it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a policy file.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine policy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Scored observations required per competency before it counts as
    /// covered.
    #[serde(default = "default_min_observations")]
    pub min_observations: u32,

    /// Hard cap on activities per session.
    #[serde(default = "default_activity_budget")]
    pub activity_budget: u32,

    /// Number of items presented during the diagnostic (clamped to 2..=4).
    #[serde(default = "default_diagnostic_items")]
    pub diagnostic_items: u32,

    /// Consecutive matches required for a promotion.
    #[serde(default = "default_promote_streak")]
    pub promote_streak: u32,

    /// Consecutive mismatches required for a demotion.
    #[serde(default = "default_demote_streak")]
    pub demote_streak: u32,

    /// Compare-and-set retries on profile write conflicts.
    #[serde(default = "default_cas_retries")]
    pub cas_retries: u32,

    /// Backoff before the single retry of an unavailable adapter call.
    #[serde(default = "default_tool_retry_backoff_ms")]
    pub tool_retry_backoff_ms: u64,

    /// How many prior sessions to consider when avoiding repeat variants.
    #[serde(default = "default_history_window_sessions")]
    pub history_window_sessions: u32,

    /// Timeout for a single verification command.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_min_observations() -> u32 {
    3
}

fn default_activity_budget() -> u32 {
    12
}

fn default_diagnostic_items() -> u32 {
    2
}

fn default_promote_streak() -> u32 {
    3
}

fn default_demote_streak() -> u32 {
    2
}

fn default_cas_retries() -> u32 {
    3
}

fn default_tool_retry_backoff_ms() -> u64 {
    250
}

fn default_history_window_sessions() -> u32 {
    3
}

fn default_command_timeout_secs() -> u64 {
    10
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            min_observations: default_min_observations(),
            activity_budget: default_activity_budget(),
            diagnostic_items: default_diagnostic_items(),
            promote_streak: default_promote_streak(),
            demote_streak: default_demote_streak(),
            cas_retries: default_cas_retries(),
            tool_retry_backoff_ms: default_tool_retry_backoff_ms(),
            history_window_sessions: default_history_window_sessions(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl EnginePolicy {
    /// Parse a policy from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a policy file, falling back to defaults for missing fields.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Conventional policy file location, `<config dir>/praxis/policy.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("praxis").join("policy.toml"))
    }

    /// Load from the conventional location, or defaults when the file is
    /// absent.
    pub fn load_default() -> Result<Self, PolicyError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Diagnostic item count clamped to the supported 2..=4 range.
    #[must_use]
    pub fn diagnostic_item_count(&self) -> usize {
        self.diagnostic_items.clamp(2, 4) as usize
    }

    /// Command timeout as a `Duration`.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Retry backoff as a `Duration`.
    #[must_use]
    pub fn tool_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.tool_retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_parameters() {
        let policy = EnginePolicy::default();
        assert_eq!(policy.min_observations, 3);
        assert_eq!(policy.promote_streak, 3);
        assert_eq!(policy.demote_streak, 2);
        assert_eq!(policy.diagnostic_item_count(), 2);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let policy = EnginePolicy::from_toml_str("min_observations = 5\n").unwrap();
        assert_eq!(policy.min_observations, 5);
        assert_eq!(policy.activity_budget, 12);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let policy = EnginePolicy::from_toml_str("").unwrap();
        assert_eq!(policy, EnginePolicy::default());
    }

    #[test]
    fn diagnostic_count_is_clamped() {
        let policy = EnginePolicy {
            diagnostic_items: 9,
            ..EnginePolicy::default()
        };
        assert_eq!(policy.diagnostic_item_count(), 4);
        let policy = EnginePolicy {
            diagnostic_items: 0,
            ..EnginePolicy::default()
        };
        assert_eq!(policy.diagnostic_item_count(), 2);
    }
}
