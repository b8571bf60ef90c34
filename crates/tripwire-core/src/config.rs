//! Configuration loading and typed config structures for Tripwire.
//!
//! The canonical configuration lives in `tripwire-config.yaml`. Every
//! section and field has a default, so an empty (or missing) file yields a
//! runnable setup: content under `content/`, a local `SQLite` database, and
//! `info` logging.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `tripwire-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TripwireConfig {
    /// Where trigger content and the world fixture live.
    #[serde(default)]
    pub content: ContentConfig,

    /// Queue sizes and cascade limits.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Permanent-rule state storage.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TripwireConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration from a file if it exists, defaults otherwise.
    ///
    /// Environment overrides apply in both cases.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.persistence.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.persistence.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.command_queue_capacity",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.runtime.outbound_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.outbound_capacity",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Content locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentConfig {
    /// Directory of `*.yaml` trigger files, one scope per file.
    #[serde(default = "default_triggers_dir")]
    pub triggers_dir: PathBuf,

    /// World fixture for the in-memory world.
    #[serde(default = "default_world_file")]
    pub world_file: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            triggers_dir: default_triggers_dir(),
            world_file: default_world_file(),
        }
    }
}

/// Runner and dispatcher limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of the bounded inbound command queue.
    #[serde(default = "default_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Capacity of the outbound event broadcast channel.
    #[serde(default = "default_queue_capacity")]
    pub outbound_capacity: usize,

    /// Maximum nesting of `fire_trigger` chains within one dispatch.
    #[serde(default = "default_max_cascade_depth")]
    pub max_cascade_depth: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: default_queue_capacity(),
            outbound_capacity: default_queue_capacity(),
            max_cascade_depth: default_max_cascade_depth(),
        }
    }
}

/// Permanent-rule state storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// `SQLite` connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Seconds between periodic saves; 0 disables autosave.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,

    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl PersistenceConfig {
    /// Override the database URL with `TRIPWIRE_DATABASE_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRIPWIRE_DATABASE_URL") {
            self.database_url = val;
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            autosave_interval_secs: default_autosave_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_triggers_dir() -> PathBuf {
    PathBuf::from("content/triggers")
}

fn default_world_file() -> PathBuf {
    PathBuf::from("content/world.yaml")
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_max_cascade_depth() -> u32 {
    16
}

fn default_database_url() -> String {
    "sqlite://tripwire.db".to_owned()
}

const fn default_autosave_interval_secs() -> u64 {
    60
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}
