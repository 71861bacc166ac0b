//! AMF Configuration
//!
//! YAML configuration, read from the `amf:` section:
//!
//! ```yaml
//! amf:
//!   max_num_of_ue: 1024
//!   deregistration:
//!     teardown_on_send_failure: true
//!   logger:
//!     level: info
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::context::DEFAULT_MAX_NUM_OF_UE;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("max_num_of_ue must be greater than zero")]
    InvalidMaxNumOfUe,
}

/// AMF configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AmfConfig {
    /// UE context store capacity
    pub max_num_of_ue: usize,
    pub deregistration: DeregistrationConfig,
    pub logger: LoggerConfig,
}

impl Default for AmfConfig {
    fn default() -> Self {
        Self {
            max_num_of_ue: DEFAULT_MAX_NUM_OF_UE,
            deregistration: DeregistrationConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

/// De-registration procedure options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeregistrationConfig {
    /// Release the UE locally when the Deregistration Accept cannot be sent
    pub teardown_on_send_failure: bool,
}

impl Default for DeregistrationConfig {
    fn default() -> Self {
        Self { teardown_on_send_failure: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    amf: Option<AmfConfig>,
}

impl AmfConfig {
    /// Parse a YAML document; a missing `amf:` section yields defaults
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let file: Option<ConfigFile> = serde_yaml::from_str(content)?;
        let config = match file.and_then(|file| file.amf) {
            Some(config) => config,
            None => {
                log::warn!("No 'amf' section in config file");
                AmfConfig::default()
            }
        };

        if config.max_num_of_ue == 0 {
            return Err(ConfigError::InvalidMaxNumOfUe);
        }
        Ok(config)
    }

    /// Load the configuration file; an unreadable file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading configuration from: {}", path.display());

        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) => {
                log::warn!("Could not read config file '{}': {}. Using defaults.", path.display(), e);
                Ok(AmfConfig::default())
            }
        }
    }
}
