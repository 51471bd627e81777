//! Configuration file handling for ~/.printmap/config.ini.
//!
//! Loading never partially succeeds: any invalid value, unknown strategy
//! type or incomplete credential set rejects the whole file so the problem
//! surfaces before a single tile is fetched.

use super::connections::ConnectionSettings;
use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::security::{SecurityError, SecurityStrategy, SecurityStrategyResolver};
use crate::tiers::ScaleTable;
use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Config text is not valid INI
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A required key is absent
    #[error("Invalid configuration: [{section}] is missing '{key}'")]
    MissingKey { section: String, key: String },

    /// A security strategy cannot be built
    #[error("Invalid security strategy [{section}]: {source}")]
    Security {
        section: String,
        #[source]
        source: SecurityError,
    },
}

/// Parsed configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Connection limits and timeouts
    pub connections: ConnectionSettings,
    /// Print scales, if configured
    pub scales: Option<ScaleTable>,
    /// Security strategies in file order
    pub security: Vec<SecurityStrategy>,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.printmap/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text)?;
        super::parser::parse_ini(&ini)
    }

    /// Resolver over the configured strategies, in file order.
    pub fn security_resolver(&self) -> SecurityStrategyResolver {
        SecurityStrategyResolver::new(self.security.clone())
    }
}

/// Get the path to the config directory (~/.printmap).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the path to the config file (~/.printmap/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
