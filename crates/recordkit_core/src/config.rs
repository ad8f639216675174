//! Core configuration model.
//!
//! # Responsibility
//! - Group logging, id worker and mapper guard settings in one document.
//! - Parse JSON configuration with per-field defaults.
//!
//! # Invariants
//! - Every field has a default; an empty object is a valid configuration.
//! - `validate()` runs as part of `from_json_str`.

use crate::id::IdWorkerConfig;
use crate::logging::{default_log_level, normalize_level};
use crate::mapper::MapperOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub id_worker: IdWorkerConfig,
    pub mapper: MapperOptions,
}

impl CoreConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.logging.log_dir {
            if dir.trim().is_empty() {
                return Err(ConfigError::Invalid("logging.log_dir cannot be empty".to_string()));
            }
        }
        self.id_worker
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("id_worker: {err}")))?;
        Ok(())
    }
}
