use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::errors::{Result, StorageError};

/// Engine configuration module
/// This module handles the configuration handed to backend constructors,
/// including loading, validating and saving it as JSON.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Connection string, `scheme://path-or-dsn`
    #[serde(default = "default_database_uri")]
    pub database_uri: String,

    /// Filesystem backend options
    #[serde(default)]
    pub filesystem: FilesystemConfig,

    /// Defaults for naive search
    #[serde(default)]
    pub search: SearchConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Filesystem backend configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FilesystemConfig {
    // @field: Seconds a store lock lease stays valid
    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,

    // @field: Create the root directory when it does not exist
    #[serde(default = "default_true")]
    pub create_missing: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            lock_lease_secs: default_lock_lease_secs(),
            create_missing: default_true(),
        }
    }
}

/// Search defaults
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchConfig {
    // @field: Match against source text
    #[serde(default = "default_true")]
    pub search_source: bool,

    // @field: Match against target text
    #[serde(default = "default_true")]
    pub search_target: bool,

    // @field: Maximum number of results, unlimited when absent
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_source: default_true(),
            search_target: default_true(),
            limit: None,
        }
    }
}

impl SearchConfig {
    // @returns: Search options seeded from these defaults
    pub fn options(&self) -> crate::search::SearchOptions {
        crate::search::SearchOptions {
            search_source: self.search_source,
            search_target: self.search_target,
            limit: self.limit,
            offset: 0,
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_database_uri() -> String {
    "mem://".to_string()
}

fn default_lock_lease_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Configuration pointing at a given connection string
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            database_uri: uri.into(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON, creating the parent directory
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !self.database_uri.contains("://") {
            return Err(StorageError::Config(format!(
                "Database URI must look like scheme://path, got '{}'",
                self.database_uri
            )));
        }

        if self.filesystem.lock_lease_secs == 0 {
            return Err(StorageError::Config(
                "Lock lease must be at least one second".to_string(),
            ));
        }

        if self.search.limit == Some(0) {
            return Err(StorageError::Config(
                "Search limit must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Per-user data directory for filesystem databases
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("locstore"))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_uri: default_database_uri(),
            filesystem: FilesystemConfig::default(),
            search: SearchConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
