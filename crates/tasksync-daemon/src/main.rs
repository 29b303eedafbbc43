//! tasksync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Periodic sync cycles (every `sync.interval_secs`)
//! - Immediate cycles on SIGUSR1
//! - Reloading `connection.yaml` on SIGHUP
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the task database, builds a [`SyncOrchestrator`] over
//! the WebDAV connector and hands it to a [`SyncScheduler`]. Everything is
//! tied to one `CancellationToken`; on shutdown the scheduler lets an
//! active cycle finish before the process exits.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use tasksync_cache::{DatabasePool, SqliteTaskRepository};
use tasksync_core::{
    config::{Config, LoggingConfig},
    connection::RemoteConnectionConfig,
};
use tasksync_sync::{SchedulerHandle, SyncOrchestrator, SyncOutcome, SyncScheduler};
use tasksync_webdav::WebDavConnector;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming an alternate configuration file
const CONFIG_ENV: &str = "TASKSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and the local store for the daemon's lifetime
struct DaemonService {
    config: Config,
    connection_path: PathBuf,
    repo: Arc<SqliteTaskRepository>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    async fn new(config: Config, config_path: &Path, shutdown: CancellationToken) -> Result<Self> {
        let pool = DatabasePool::new(&config.storage.database)
            .await
            .context("Failed to open task database")?;
        let repo = Arc::new(SqliteTaskRepository::new(pool.pool().clone()));

        Ok(Self {
            connection_path: RemoteConnectionConfig::path_for_config(config_path),
            config,
            repo,
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    async fn run(&self) -> Result<()> {
        let connector = Arc::new(WebDavConnector::new(
            Duration::from_secs(self.config.remote.timeout_secs),
            self.config.sync.remote_dir.clone(),
        ));
        let orchestrator = Arc::new(
            SyncOrchestrator::new(self.repo.clone(), connector, &self.config)
                .context("Invalid conflict settings")?,
        );

        match RemoteConnectionConfig::load(&self.connection_path) {
            Ok(Some(connection)) => {
                info!(host = %connection.host, "Using saved connection");
                orchestrator.set_connection(Some(connection)).await;
            }
            Ok(None) => info!("No saved connection; cycles are skipped until 'tasksync connect'"),
            Err(e) => warn!(error = %e, "Saved connection unreadable, starting disconnected"),
        }

        let (scheduler, handle) = SyncScheduler::new(
            Arc::clone(&orchestrator),
            Duration::from_secs(self.config.sync.interval_secs),
            self.shutdown.clone(),
        );
        let scheduler_task = tokio::spawn(scheduler.run());
        let reporter = tokio::spawn(report_outcomes(handle.outcomes(), self.shutdown.clone()));

        let control = ControlContext {
            handle,
            orchestrator,
            connection_path: self.connection_path.clone(),
        };
        let shutdown = self.shutdown.clone();
        let control_task = tokio::spawn(async move {
            if let Err(e) = control.listen(shutdown).await {
                error!(error = %e, "Control signals unavailable");
            }
        });

        self.shutdown.cancelled().await;
        info!("Shutdown requested, waiting for the scheduler");

        scheduler_task.await.context("Scheduler task failed")?;
        for task in [reporter, control_task] {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task failed");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Control signals
// ============================================================================

/// What SIGUSR1 and SIGHUP act on
struct ControlContext {
    handle: SchedulerHandle,
    orchestrator: Arc<SyncOrchestrator>,
    connection_path: PathBuf,
}

impl ControlContext {
    async fn listen(&self, shutdown: CancellationToken) -> Result<()> {
        let mut sync_now =
            signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
        let mut reload = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(()) = sync_now.recv() => {
                    info!("Received SIGUSR1, requesting sync");
                    self.handle.request_sync();
                }
                Some(()) = reload.recv() => {
                    info!("Received SIGHUP, reloading connection settings");
                    self.reload_connection().await;
                }
            }
        }
        Ok(())
    }

    /// Re-read `connection.yaml` and connect with it
    ///
    /// A successful connect also pushes the next scheduled cycle one full
    /// interval away. If the server cannot be reached the new settings are
    /// still adopted and opened at the start of the next cycle.
    async fn reload_connection(&self) {
        match RemoteConnectionConfig::load(&self.connection_path) {
            Ok(Some(connection)) => {
                if let Err(e) = self.handle.connect(connection.clone()).await {
                    warn!(error = %e, "Connect with updated settings failed, will retry next cycle");
                    self.orchestrator.set_connection(Some(connection)).await;
                }
            }
            Ok(None) => self.orchestrator.set_connection(None).await,
            Err(e) => warn!(error = %e, "Connection settings unreadable, keeping current ones"),
        }
    }
}

/// Log one line per completed cycle
async fn report_outcomes(
    mut outcomes: watch::Receiver<Option<SyncOutcome>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = outcomes.changed() => {
                if changed.is_err() {
                    break;
                }
                let outcome = outcomes.borrow_and_update().clone();
                match outcome {
                    Some(SyncOutcome::Success(report)) => {
                        info!(cycle_id = %report.cycle_id, "Sync cycle succeeded: {}", report.summary());
                    }
                    Some(SyncOutcome::Disconnected) => info!("Sync cycle skipped, not connected"),
                    Some(SyncOutcome::Error(message)) => warn!(error = %message, "Sync cycle failed"),
                    None => {}
                }
            }
        }
    }
}

// ============================================================================
// Shutdown
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to install Ctrl+C handler")?;
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
    Ok(())
}

// ============================================================================
// Startup
// ============================================================================

fn config_path_from(env_value: Option<std::ffi::OsString>) -> PathBuf {
    env_value
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// `RUST_LOG` wins over `logging.level`
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from(std::env::var_os(CONFIG_ENV));
    let config = Config::load_checked(&config_path)?;

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "tasksync daemon starting (tasksyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal(signal_token.clone()).await {
            error!(error = %e, "Cannot listen for shutdown signals, exiting");
            signal_token.cancel();
        }
    });

    let service = DaemonService::new(config, &config_path, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("tasksync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "tasksync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn temp_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.database = dir.join("tasks.db");
        config
    }

    #[test]
    fn config_path_prefers_environment() {
        let path = config_path_from(Some(OsString::from("/srv/tasksync/config.yaml")));
        assert_eq!(path, PathBuf::from("/srv/tasksync/config.yaml"));
    }

    #[test]
    fn config_path_falls_back_to_default() {
        assert_eq!(config_path_from(None), Config::default_path());
        assert_eq!(config_path_from(Some(OsString::new())), Config::default_path());
    }

    #[test]
    fn connection_file_follows_config_file() {
        let path = RemoteConnectionConfig::path_for_config(Path::new("/srv/tasksync/config.yaml"));
        assert_eq!(path, PathBuf::from("/srv/tasksync/connection.yaml"));
    }

    #[tokio::test]
    async fn service_runs_disconnected_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(dir.path());
        let token = CancellationToken::new();

        let service = DaemonService::new(config, &dir.path().join("config.yaml"), token.clone())
            .await
            .unwrap();

        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.cancel();
        });

        tokio::time::timeout(Duration::from_secs(10), service.run())
            .await
            .expect("daemon stops after cancel")
            .unwrap();
        assert!(dir.path().join("tasks.db").exists());
    }

    #[tokio::test]
    async fn reload_without_file_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(dir.path());
        let pool = DatabasePool::new(&config.storage.database).await.unwrap();
        let repo = Arc::new(SqliteTaskRepository::new(pool.pool().clone()));
        let connector = Arc::new(WebDavConnector::new(Duration::from_secs(1), "/tasks"));
        let orchestrator = Arc::new(SyncOrchestrator::new(repo, connector, &config).unwrap());
        orchestrator
            .set_connection(Some(RemoteConnectionConfig::new(
                "https://dav.example.com",
                "alice",
                "pw",
            )))
            .await;

        let (_scheduler, handle) = SyncScheduler::new(
            Arc::clone(&orchestrator),
            Duration::from_secs(300),
            CancellationToken::new(),
        );
        let control = ControlContext {
            handle,
            orchestrator: Arc::clone(&orchestrator),
            connection_path: dir.path().join("connection.yaml"),
        };

        control.reload_connection().await;
        assert!(!orchestrator.is_connected().await);
    }
}
