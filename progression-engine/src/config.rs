//! Engine configuration
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: usize,
        max: usize,
        value: usize,
    },
    #[error("config JSON is invalid: {0}")]
    Parse(String),
}

/// Tunables for the progression engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many incomplete next steps to surface.
    #[serde(default = "EngineConfig::default_next_step_limit")]
    pub next_step_limit: usize,
}

impl EngineConfig {
    const MIN_NEXT_STEPS: usize = 1;
    const MAX_NEXT_STEPS: usize = 25;

    #[must_use]
    pub const fn default_next_step_limit() -> usize {
        3
    }

    /// Parse and validate a config from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a field is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(Self::MIN_NEXT_STEPS..=Self::MAX_NEXT_STEPS).contains(&self.next_step_limit) {
            return Err(ConfigError::RangeViolation {
                field: "next_step_limit",
                min: Self::MIN_NEXT_STEPS,
                max: Self::MAX_NEXT_STEPS,
                value: self.next_step_limit,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            next_step_limit: Self::default_next_step_limit(),
        }
    }
}
