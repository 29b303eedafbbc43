//! CLI subcommands and the state they share

pub mod completions;
pub mod config;
pub mod connect;
pub mod log;
pub mod status;
pub mod sync;
pub mod task;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use tasksync_cache::{DatabasePool, SqliteTaskRepository};
use tasksync_core::config::Config;
use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_webdav::WebDavConnector;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options every command runs with
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
}

impl CommandContext {
    pub fn new(format: OutputFormat, config: Option<&str>) -> Self {
        let config_path = config
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_path);
        Self {
            format,
            config_path,
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    pub fn is_json(&self) -> bool {
        self.format.is_json()
    }

    /// Saved connection settings live beside the configuration file
    pub fn connection_path(&self) -> PathBuf {
        RemoteConnectionConfig::path_for_config(&self.config_path)
    }

    /// Configuration as written, defaults when the file does not exist
    pub fn read_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        Config::load(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))
    }

    /// Configuration that passed validation
    pub fn load_config(&self) -> Result<Config> {
        Config::load_checked(&self.config_path)
    }

    pub fn load_connection(&self) -> Result<Option<RemoteConnectionConfig>> {
        RemoteConnectionConfig::load(&self.connection_path())
    }

    pub async fn open_repository(&self, config: &Config) -> Result<Arc<SqliteTaskRepository>> {
        let pool = DatabasePool::new(&config.storage.database)
            .await
            .context("Failed to open task database")?;
        Ok(Arc::new(SqliteTaskRepository::new(pool.pool().clone())))
    }
}

/// WebDAV connector configured from `remote` and `sync`
pub fn connector(config: &Config) -> WebDavConnector {
    WebDavConnector::new(
        Duration::from_secs(config.remote.timeout_secs),
        config.sync.remote_dir.clone(),
    )
}
