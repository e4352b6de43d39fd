//! Registry configuration.

use std::path::{Path, PathBuf};

use bindreg_core::{RegistryParams, DEFAULT_CAPACITY};
use bindreg_ledger::DEFAULT_EVENT_CAPACITY;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a registry deployment.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Maximum number of identities.
    pub capacity: u32,

    /// Notifications buffered per subscriber before it starts lagging.
    pub event_buffer: usize,

    /// SQLite database path. `None` keeps the registry in memory.
    pub database: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            event_buffer: DEFAULT_EVENT_CAPACITY,
            database: None,
        }
    }
}

impl RegistryConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        self.params()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        if self.event_buffer == 0 {
            return Err(Error::Config("event_buffer must be at least 1".into()));
        }
        Ok(())
    }

    /// The deployment parameters carried into registry state.
    pub fn params(&self) -> RegistryParams {
        RegistryParams {
            capacity: self.capacity,
        }
    }
}
