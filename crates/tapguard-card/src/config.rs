//! Card session configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::handle::DEFAULT_TIMEOUT_MS;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV_VAR: &str = "TAPGUARD_CARD_CONFIG";

/// Card session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    /// Read/write timeout applied to every tap (milliseconds)
    pub transceive_timeout_ms: u64,

    /// Whether to wait out a known lockout before the real operation
    pub wait_for_unlock: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            transceive_timeout_ms: DEFAULT_TIMEOUT_MS,
            wait_for_unlock: true,
        }
    }
}

impl CardConfig {
    pub fn transceive_timeout(&self) -> Duration {
        Duration::from_millis(self.transceive_timeout_ms)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the file named by `TAPGUARD_CARD_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
