//! Configuration module for tasksync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Remote credentials are deliberately not part of [`Config`]; they live in
//! [`crate::connection::RemoteConnectionConfig`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for tasksync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub conflicts: ConflictsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduled sync cycles.
    pub interval_secs: u64,
    /// Remote collection holding the exchanged files.
    pub remote_dir: String,
    /// Working file rewritten on every cycle.
    pub export_file: String,
    /// File holding the latest synced snapshot.
    pub canonical_file: String,
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Upper bound for a single remote request, in seconds.
    pub timeout_secs: u64,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Timestamps closer than this are treated as equal.
    pub tolerance_secs: u64,
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Load from `path`, or defaults when no file exists there, and reject
    /// values that fail [`Config::validate`].
    pub fn load_checked(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            Self::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        } else {
            Self::default()
        };
        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::bail!(
                "Invalid configuration in {}: {}",
                path.display(),
                details.join("; ")
            );
        }
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tasksync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }
}

/// Directory holding `config.yaml` and `connection.yaml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("tasksync")
}

impl SyncConfig {
    /// Remote path of the working export file.
    pub fn export_path(&self) -> String {
        join_remote(&self.remote_dir, &self.export_file)
    }

    /// Remote path of the canonical snapshot.
    pub fn canonical_path(&self) -> String {
        join_remote(&self.remote_dir, &self.canonical_file)
    }
}

fn join_remote(dir: &str, file: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let file = file.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{file}")
    } else if dir.starts_with('/') {
        format!("{dir}/{file}")
    } else {
        format!("/{dir}/{file}")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            remote_dir: "/tasks".to_string(),
            export_file: "tasks_export.json".to_string(),
            canonical_file: "tasks.json".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self { tolerance_secs: 0 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("tasksync")
                .join("tasks.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Largest accepted `conflicts.tolerance_secs`.
pub const MAX_TOLERANCE_SECS: u64 = 3600;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        for (field, value) in [
            ("sync.export_file", &self.sync.export_file),
            ("sync.canonical_file", &self.sync.canonical_file),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            } else if value.contains('/') {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be a file name, not a path: {value}"),
                });
            }
        }
        if !self.sync.export_file.is_empty() && self.sync.export_file == self.sync.canonical_file {
            errors.push(ValidationError {
                field: "sync.export_file".into(),
                message: "must differ from sync.canonical_file".into(),
            });
        }

        // --- remote ---
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- conflicts ---
        if self.conflicts.tolerance_secs > MAX_TOLERANCE_SECS {
            errors.push(ValidationError {
                field: "conflicts.tolerance_secs".into(),
                message: format!("must be at most {MAX_TOLERANCE_SECS}"),
            });
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "must be one of {:?}, got {:?}",
                    VALID_LOG_LEVELS, self.logging.level
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "must be one of {:?}, got {:?}",
                    VALID_LOG_FORMATS, self.logging.format
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_remote_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.sync.remote_dir = dir.into();
        self
    }

    pub fn sync_export_file(mut self, file: impl Into<String>) -> Self {
        self.config.sync.export_file = file.into();
        self
    }

    pub fn sync_canonical_file(mut self, file: impl Into<String>) -> Self {
        self.config.sync.canonical_file = file.into();
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.timeout_secs = seconds;
        self
    }

    pub fn conflicts_tolerance_secs(mut self, seconds: u64) -> Self {
        self.config.conflicts.tolerance_secs = seconds;
        self
    }

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
