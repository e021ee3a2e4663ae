//! Engine configuration.
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_GLOBAL_LOCATION, DEFAULT_MAX_CASCADE_STEPS};
use crate::definition::GameVersion;
use crate::error::ConfigError;

/// Tunables for the registry, the dispatcher and the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// On this version `feats` stays location-local.
    #[serde(default)]
    pub latest_version: GameVersion,
    /// Turn content errors inside the cascade into hard event failures.
    #[serde(default)]
    pub strict_content: bool,
    /// Location whose groups hold location-independent challenges.
    #[serde(default = "EngineConfig::default_global_location")]
    pub global_location: String,
    /// Upper bound on cascade worklist steps for one event.
    #[serde(default = "EngineConfig::default_max_cascade_steps")]
    pub max_cascade_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            latest_version: GameVersion::default(),
            strict_content: false,
            global_location: Self::default_global_location(),
            max_cascade_steps: Self::default_max_cascade_steps(),
        }
    }
}

impl EngineConfig {
    fn default_global_location() -> String {
        DEFAULT_GLOBAL_LOCATION.to_string()
    }

    const fn default_max_cascade_steps() -> usize {
        DEFAULT_MAX_CASCADE_STEPS
    }

    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a field is out of bounds.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cascade_steps == 0 {
            return Err(ConfigError::MinViolation {
                field: "max_cascade_steps",
                min: 1,
                value: self.max_cascade_steps,
            });
        }
        if self.global_location.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "global_location",
            });
        }
        Ok(())
    }

    /// Whether content errors should fail the event instead of being logged.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict_content
    }
}
