//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::client::{DecodeFailurePolicy, DEFAULT_CATALOG_TABLE};
use crate::index::DEFAULT_INDEX_TABLE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Waveform archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// SQLite database holding the segment index
    #[serde(default = "default_index_db")]
    pub index_db: PathBuf,

    #[serde(default = "default_index_table")]
    pub index_table: String,

    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

fn default_index_db() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("seisarchive").join("timeseries.sqlite"))
        .unwrap_or_else(|| PathBuf::from("./timeseries.sqlite"))
}

fn default_index_table() -> String {
    DEFAULT_INDEX_TABLE.to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            index_db: default_index_db(),
            index_table: default_index_table(),
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

/// Event catalog and pick tables configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// SQLite database holding the catalog and pick tables
    #[serde(default = "default_catalog_db")]
    pub database: PathBuf,

    #[serde(default = "default_catalog_table")]
    pub table: String,

    /// Default pick contributor
    #[serde(default = "default_contributor")]
    pub contributor: String,
}

fn default_catalog_db() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("seisarchive").join("catalog.sqlite"))
        .unwrap_or_else(|| PathBuf::from("./catalog.sqlite"))
}

fn default_catalog_table() -> String {
    DEFAULT_CATALOG_TABLE.to_string()
}

fn default_contributor() -> String {
    "UW".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: default_catalog_db(),
            table: default_catalog_table(),
            contributor: default_contributor(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("seisarchive").join("config.toml")),
            Some(PathBuf::from("/etc/seisarchive/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Archive overrides
        if let Some(path) = var("SEISARCHIVE_INDEX_DB") {
            self.archive.index_db = PathBuf::from(path);
        }
        if let Some(table) = var("SEISARCHIVE_INDEX_TABLE") {
            self.archive.index_table = table;
        }

        // Catalog overrides
        if let Some(path) = var("SEISARCHIVE_CATALOG_DB") {
            self.catalog.database = PathBuf::from(path);
        }
        if let Some(contributor) = var("SEISARCHIVE_CONTRIBUTOR") {
            self.catalog.contributor = contributor;
        }

        // Logging overrides
        if let Some(level) = var("SEISARCHIVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("SEISARCHIVE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# seisarchive configuration
#
# Environment variables override these settings:
# - SEISARCHIVE_INDEX_DB
# - SEISARCHIVE_INDEX_TABLE
# - SEISARCHIVE_CATALOG_DB
# - SEISARCHIVE_CONTRIBUTOR
# - SEISARCHIVE_LOG_LEVEL
# - SEISARCHIVE_LOG_FORMAT

[archive]
# SQLite database holding the segment index
index_db = "~/.local/share/seisarchive/timeseries.sqlite"

# Segment index table
index_table = "tsindex"

# What to do with a segment that cannot be read or decoded:
# skip (report it and continue) or abort (fail the request)
decode_failure = "skip"

[catalog]
# SQLite database holding the event catalog and pick tables
database = "~/.local/share/seisarchive/catalog.sqlite"

# Event catalog table
table = "catalog"

# Default pick contributor (table picks_<contributor>)
contributor = "UW"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/seisarchive/seisarchive.log"
"#
    .to_string()
}
