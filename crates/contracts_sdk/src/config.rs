//! Registry configuration.
//!
//! The contracts directory and per-dataset version pins can be given in code,
//! deserialized from a config file, or read from the environment:
//!
//! - `SCHEMA_CONTRACTS_DIR`: directory holding `<dataset_id>.v<N>.<ext>` files
//! - `SCHEMA_CONTRACT_VERSION_<DATASET_ID>`: pins a dataset to one version

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Environment variable naming the contracts directory.
pub const CONTRACTS_DIR_VAR: &str = "SCHEMA_CONTRACTS_DIR";

/// Prefix of the per-dataset version pin variables.
pub const VERSION_PIN_PREFIX: &str = "SCHEMA_CONTRACT_VERSION_";

/// Directory used when none is configured.
pub const DEFAULT_CONTRACTS_DIR: &str = "contracts";

/// Errors in the registry configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A pin variable does not hold a version number
    #[error("Invalid version pin {var}={value}: expected a positive integer")]
    InvalidPin { var: String, value: String },

    /// A pin names version 0
    #[error("Version pin for '{0}' must be at least 1")]
    ZeroPin(String),

    /// A pin variable has no dataset id after the prefix
    #[error("Version pin variable {0} names no dataset")]
    EmptyPinDataset(String),

    /// The contracts directory is empty
    #[error("Contracts directory must not be empty")]
    EmptyDirectory,
}

/// Where contracts live and which versions are pinned.
///
/// # Example
///
/// ```rust
/// use contracts_sdk::RegistryConfig;
///
/// let config = RegistryConfig::new("/etc/schema-contracts").with_pin("IPE_07", 2);
///
/// assert_eq!(config.pin("IPE_07"), Some(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Directory holding contract documents
    pub contracts_dir: PathBuf,

    /// Version overrides keyed by dataset id
    pub version_pins: BTreeMap<String, u32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            contracts_dir: PathBuf::from(DEFAULT_CONTRACTS_DIR),
            version_pins: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    /// Creates a configuration for a contracts directory.
    pub fn new(contracts_dir: impl Into<PathBuf>) -> Self {
        Self {
            contracts_dir: contracts_dir.into(),
            version_pins: BTreeMap::new(),
        }
    }

    /// Pins a dataset to one version.
    pub fn with_pin(mut self, dataset_id: impl Into<String>, version: u32) -> Self {
        self.version_pins.insert(dataset_id.into(), version);
        self
    }

    /// Sets the contracts directory.
    pub fn with_contracts_dir(mut self, contracts_dir: impl Into<PathBuf>) -> Self {
        self.contracts_dir = contracts_dir.into();
        self
    }

    /// Returns the pinned version of a dataset.
    pub fn pin(&self, dataset_id: &str) -> Option<u32> {
        self.version_pins.get(dataset_id).copied()
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds the configuration from `(name, value)` pairs.
    ///
    /// Unrelated variables are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (name, value) in vars {
            let (name, value) = (name.as_ref(), value.as_ref().trim());

            if name == CONTRACTS_DIR_VAR {
                info!(dir = value, "contracts directory set from environment");
                config.contracts_dir = PathBuf::from(value);
                continue;
            }

            let Some(dataset_id) = name.strip_prefix(VERSION_PIN_PREFIX) else {
                continue;
            };
            if dataset_id.is_empty() {
                return Err(ConfigError::EmptyPinDataset(name.to_string()));
            }
            let version: u32 = value.parse().map_err(|_| ConfigError::InvalidPin {
                var: name.to_string(),
                value: value.to_string(),
            })?;
            info!(dataset_id, version, "version pin set from environment");
            config.version_pins.insert(dataset_id.to_string(), version);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values no registry can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contracts_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDirectory);
        }
        if let Some((dataset_id, _)) = self.version_pins.iter().find(|(_, v)| **v == 0) {
            return Err(ConfigError::ZeroPin(dataset_id.clone()));
        }
        Ok(())
    }
}
