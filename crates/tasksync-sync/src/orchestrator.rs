//! Sync orchestrator
//!
//! The [`SyncOrchestrator`] runs one synchronization cycle between the local
//! task repository and the remote store.
//!
//! ## Cycle Flow
//!
//! 1. **Exporting**: capture the local collection as a snapshot
//! 2. **Uploading**: encode it and write the working export file
//! 3. **CheckingRemote**: stat the canonical file and let the resolver pick
//!    a direction
//!    - upload: publish the snapshot as the canonical file, mark tasks synced
//!    - download: go to step 4
//!    - no-op: both sides already agree
//! 4. **Downloading**: fetch and decode the canonical file, replace the
//!    local collection with it
//!
//! Any failure ends the cycle in `Error`; the orchestrator then returns to
//! `Idle`. Nothing is retried within a cycle: the next cycle is the retry.
//!
//! ## Mutual Exclusion
//!
//! At most one cycle runs at a time. [`SyncOrchestrator::try_run_cycle`]
//! returns `None` instead of waiting when a cycle is already active.
//! Callers that hand the cycle to another task claim the slot first with
//! [`SyncOrchestrator::try_begin`] so the claim is visible immediately.
//!
//! Other processes sharing the local store (the CLI next to the daemon)
//! are kept out by a lease taken through the repository for the length of
//! the cycle. A lease left by a crashed process expires once every remote
//! call it could still make would have timed out.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use tasksync_audit::AuditLogger;
use tasksync_conflict::{ConflictError, ConflictResolver, RemoteState, ResolutionPolicy, SyncAction};
use tasksync_core::codec;
use tasksync_core::config::Config;
use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::domain::{CycleId, Snapshot};
use tasksync_core::ports::{IRemoteConnector, IRemoteStore, ITaskRepository, RemoteError};

use crate::SyncError;

// ============================================================================
// Cycle state and outcome
// ============================================================================

/// Step the orchestrator is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Exporting,
    Uploading,
    CheckingRemote,
    Downloading,
    /// The current cycle failed; followed by `Idle`
    Error,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Exporting => "exporting",
            Self::Uploading => "uploading",
            Self::CheckingRemote => "checking_remote",
            Self::Downloading => "downloading",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub action: SyncAction,
    /// Tasks newly marked synced after an upload
    pub tasks_synced: usize,
    /// Tasks written by a download
    pub tasks_imported: usize,
    pub duration: Duration,
}

impl CycleReport {
    /// One-line description for logs and displays
    pub fn summary(&self) -> String {
        match self.action {
            SyncAction::UploadLocal => format!(
                "uploaded local snapshot, {} task(s) marked synced",
                self.tasks_synced
            ),
            SyncAction::DownloadRemote => format!(
                "downloaded remote snapshot, {} task(s) imported",
                self.tasks_imported
            ),
            SyncAction::NoOp => "remote snapshot already up to date".to_string(),
        }
    }
}

/// Result of a cycle as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(CycleReport),
    /// No remote connection is configured; nothing was attempted
    Disconnected,
    Error(String),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// One-word status for displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Disconnected => "disconnected",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Saved connection settings and the store opened from them
#[derive(Default)]
struct ConnectionSlot {
    config: Option<RemoteConnectionConfig>,
    store: Option<Arc<dyn IRemoteStore>>,
}

/// Remote calls one cycle can make, the lazy connect included
const REMOTE_CALLS_PER_CYCLE: u32 = 6;

/// Slack for local store work on top of the remote calls
const LEASE_MARGIN_SECS: i64 = 60;

/// Lease long enough for a cycle whose every remote call runs into the timeout
fn lease_for(timeout: Duration) -> chrono::Duration {
    let remote = timeout
        .checked_mul(REMOTE_CALLS_PER_CYCLE)
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::days(1));
    remote + chrono::Duration::seconds(LEASE_MARGIN_SECS)
}

/// Claim on the single cycle slot, released when dropped
///
/// Obtained from [`SyncOrchestrator::try_begin`] and consumed by
/// [`SyncOrchestrator::run_claimed`]. Holding one keeps every other trigger
/// out, including before the claimed cycle has started running.
#[must_use = "the cycle slot is released as soon as the permit is dropped"]
pub struct CyclePermit {
    flag: Arc<AtomicBool>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for CyclePermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclePermit").finish_non_exhaustive()
    }
}

/// Drives sync cycles between the local repository and the remote store
pub struct SyncOrchestrator {
    repo: Arc<dyn ITaskRepository>,
    connector: Arc<dyn IRemoteConnector>,
    connection: Mutex<ConnectionSlot>,
    resolver: ConflictResolver,
    audit: AuditLogger,
    export_path: String,
    canonical_path: String,
    /// Upper bound for every remote call
    timeout: Duration,
    /// How long a cycle may hold the store-wide sync lease
    lease: chrono::Duration,
    cycle_in_progress: Arc<AtomicBool>,
    state: watch::Sender<CycleState>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with no connection
    ///
    /// Fails if the configured clock tolerance is out of range.
    pub fn new(
        repo: Arc<dyn ITaskRepository>,
        connector: Arc<dyn IRemoteConnector>,
        config: &Config,
    ) -> Result<Self, ConflictError> {
        let policy = ResolutionPolicy::from_config(&config.conflicts)?;
        let (state, _) = watch::channel(CycleState::Idle);

        Ok(Self {
            audit: AuditLogger::new(Arc::clone(&repo)),
            repo,
            connector,
            connection: Mutex::new(ConnectionSlot::default()),
            resolver: ConflictResolver::new(policy),
            export_path: config.sync.export_path(),
            canonical_path: config.sync.canonical_path(),
            timeout: Duration::from_secs(config.remote.timeout_secs),
            lease: lease_for(Duration::from_secs(config.remote.timeout_secs)),
            cycle_in_progress: Arc::new(AtomicBool::new(false)),
            state,
        })
    }

    /// Overrides the remote call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.lease = lease_for(timeout);
        self
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Verify `config` against the server and make it the active connection
    ///
    /// On failure the previous connection stays in place.
    pub async fn connect(&self, config: RemoteConnectionConfig) -> Result<(), SyncError> {
        let store = self
            .remote_call("connect", self.connector.connect(&config))
            .await?;

        let mut slot = self.connection.lock().await;
        info!(host = %config.host, username = %config.username, "Remote connection established");
        slot.config = Some(config);
        slot.store = Some(store);
        Ok(())
    }

    /// Adopt saved settings without contacting the server
    ///
    /// The store is opened lazily at the start of the next cycle. `None`
    /// disconnects.
    pub async fn set_connection(&self, config: Option<RemoteConnectionConfig>) {
        let mut slot = self.connection.lock().await;
        match &config {
            Some(c) => debug!(host = %c.host, "Remote connection settings loaded"),
            None => info!("Remote connection cleared"),
        }
        slot.config = config;
        slot.store = None;
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.config.is_some()
    }

    /// Store to use for one cycle, opening it from saved settings if needed
    async fn active_store(&self) -> Result<Arc<dyn IRemoteStore>, SyncError> {
        let mut slot = self.connection.lock().await;
        if let Some(store) = &slot.store {
            return Ok(Arc::clone(store));
        }
        let config = slot.config.clone().ok_or(SyncError::NotConnected)?;
        let store = self
            .remote_call("connect", self.connector.connect(&config))
            .await?;
        slot.store = Some(Arc::clone(&store));
        Ok(store)
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.cycle_in_progress.load(Ordering::Acquire)
    }

    fn transition(&self, next: CycleState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Sync state transition");
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Run one cycle unless another one is active
    ///
    /// Returns `None` without doing anything when a cycle is already in
    /// progress, here or in another process sharing the local store.
    pub async fn try_run_cycle(&self) -> Option<SyncOutcome> {
        let permit = self.try_begin()?;
        self.run_claimed(permit).await
    }

    /// Claim the cycle slot without running anything yet
    ///
    /// Returns `None` when a cycle is active or already claimed.
    pub fn try_begin(&self) -> Option<CyclePermit> {
        if self
            .cycle_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Sync cycle already in progress, trigger dropped");
            return None;
        }
        Some(CyclePermit {
            flag: Arc::clone(&self.cycle_in_progress),
        })
    }

    /// Run the cycle claimed by `permit`, releasing the slot when done
    ///
    /// Returns `None` without doing anything when another process sharing
    /// the local store holds the sync lease.
    pub async fn run_claimed(&self, permit: CyclePermit) -> Option<SyncOutcome> {
        let cycle_id = CycleId::new();
        let owner = format!("{}:{}", std::process::id(), cycle_id);

        let outcome = match self.repo.try_acquire_sync_lease(&owner, self.lease).await {
            Ok(true) => {
                let outcome = self.run_cycle(cycle_id).await;
                if let Err(e) = self.repo.release_sync_lease(&owner).await {
                    warn!(error = %e, "Failed to release sync lease, it will expire");
                }
                Some(outcome)
            }
            Ok(false) => {
                info!("Sync cycle running in another process, trigger dropped");
                None
            }
            Err(e) => Some(self.fail(cycle_id, SyncError::local(e)).await),
        };
        self.transition(CycleState::Idle);
        drop(permit);
        outcome
    }

    #[tracing::instrument(skip(self, cycle_id), fields(cycle_id = %cycle_id))]
    async fn run_cycle(&self, cycle_id: CycleId) -> SyncOutcome {
        let start = Instant::now();

        let store = match self.active_store().await {
            Ok(store) => store,
            Err(SyncError::NotConnected) => {
                info!("No remote connection configured, skipping sync cycle");
                return SyncOutcome::Disconnected;
            }
            Err(e) => return self.fail(cycle_id, e).await,
        };

        info!("Starting sync cycle");
        let (action, tasks_synced, tasks_imported) = match self.execute(store.as_ref()).await {
            Ok(result) => result,
            Err(e) => return self.fail(cycle_id, e).await,
        };

        let report = CycleReport {
            cycle_id,
            action,
            tasks_synced,
            tasks_imported,
            duration: start.elapsed(),
        };
        info!(
            action = %report.action,
            tasks_synced,
            tasks_imported,
            duration_ms = report.duration.as_millis() as u64,
            "Sync cycle completed"
        );
        self.audit.log_cycle_success(cycle_id, &report.summary()).await;
        SyncOutcome::Success(report)
    }

    /// Export, upload, compare, then publish or download; returns the action
    /// taken and the marked/imported counts
    async fn execute(
        &self,
        store: &dyn IRemoteStore,
    ) -> Result<(SyncAction, usize, usize), SyncError> {
        self.transition(CycleState::Exporting);
        let snapshot = self.repo.export().await.map_err(SyncError::local)?;
        debug!(tasks = snapshot.len(), as_of = %snapshot.exported_at(), "Exported local snapshot");

        self.transition(CycleState::Uploading);
        let bytes = codec::encode(&snapshot)?;
        self.remote_call("upload", store.upload(&self.export_path, &bytes))
            .await?;

        self.transition(CycleState::CheckingRemote);
        let remote = self.remote_state(store).await?;
        let action = self.resolver.resolve(&snapshot, remote);

        match (action, remote) {
            (SyncAction::DownloadRemote, RemoteState::Present { modified }) => {
                self.transition(CycleState::Downloading);
                let data = match self
                    .remote_call("download", store.download(&self.canonical_path))
                    .await
                {
                    Ok(data) => data,
                    Err(SyncError::NotFound(_)) => {
                        info!("Canonical snapshot removed before download, publishing local");
                        return self.publish(store, &snapshot, &bytes).await;
                    }
                    Err(e) => return Err(e),
                };
                let remote_snapshot = codec::decode(&data)?.adopted_at(modified);
                let imported = self
                    .repo
                    .import(&remote_snapshot)
                    .await
                    .map_err(SyncError::local)?;
                Ok((action, 0, imported))
            }
            (SyncAction::NoOp, _) => Ok((action, 0, 0)),
            (SyncAction::UploadLocal, _) | (SyncAction::DownloadRemote, RemoteState::Absent) => {
                self.publish(store, &snapshot, &bytes).await
            }
        }
    }

    /// Write `bytes` as the canonical file and mark the snapshot's tasks synced
    async fn publish(
        &self,
        store: &dyn IRemoteStore,
        snapshot: &Snapshot,
        bytes: &[u8],
    ) -> Result<(SyncAction, usize, usize), SyncError> {
        self.remote_call("upload", store.upload(&self.canonical_path, bytes))
            .await?;
        let published = self.published_time(store).await;
        let marked = self
            .repo
            .mark_synced(&snapshot.unsynced_ids(), snapshot.exported_at(), published)
            .await
            .map_err(SyncError::local)?;
        Ok((SyncAction::UploadLocal, marked, 0))
    }

    /// Existence and modification time of the canonical file
    async fn remote_state(&self, store: &dyn IRemoteStore) -> Result<RemoteState, SyncError> {
        let path = self.canonical_path.as_str();
        if !self.remote_call("exists", store.exists(path)).await? {
            return Ok(RemoteState::Absent);
        }
        match self
            .remote_call("modified_time", store.modified_time(path))
            .await
        {
            Ok(modified) => Ok(RemoteState::Present { modified }),
            // Deleted between the two calls
            Err(SyncError::NotFound(_)) => Ok(RemoteState::Absent),
            Err(e) => Err(e),
        }
    }

    /// Modification time of the canonical file just uploaded
    ///
    /// The upload already succeeded, so a failure here only means the local
    /// side keeps its own as-of time.
    async fn published_time(&self, store: &dyn IRemoteStore) -> Option<DateTime<Utc>> {
        match self
            .remote_call("modified_time", store.modified_time(&self.canonical_path))
            .await
        {
            Ok(modified) => Some(modified),
            Err(e) => {
                warn!(error = %e, "Could not read back canonical modification time");
                None
            }
        }
    }

    /// Bound a remote call by the configured timeout
    async fn remote_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::RemoteUnavailable(format!(
                "remote {operation} timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Record a failed cycle and convert it to an outcome
    async fn fail(&self, cycle_id: CycleId, err: SyncError) -> SyncOutcome {
        let Some(reason) = err.reason_code() else {
            return SyncOutcome::Disconnected;
        };
        self.transition(CycleState::Error);

        let message = err.to_string();
        error!(reason = %reason, error = %message, "Sync cycle failed");

        match err.task_id() {
            Some(task_id) => {
                self.audit
                    .log_task_error(cycle_id, task_id, reason, &message)
                    .await
            }
            None => self.audit.log_cycle_error(cycle_id, reason, &message).await,
        }
        SyncOutcome::Error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(SyncOutcome::Disconnected.label(), "disconnected");
        assert_eq!(SyncOutcome::Error("x".into()).label(), "error");
        assert!(SyncOutcome::Error("x".into()).is_error());
        assert!(!SyncOutcome::Disconnected.is_success());
    }

    #[test]
    fn report_summaries_name_the_action() {
        let report = CycleReport {
            cycle_id: CycleId::new(),
            action: SyncAction::DownloadRemote,
            tasks_synced: 0,
            tasks_imported: 3,
            duration: Duration::from_millis(12),
        };
        assert_eq!(report.summary(), "downloaded remote snapshot, 3 task(s) imported");

        let report = CycleReport {
            action: SyncAction::UploadLocal,
            tasks_synced: 1,
            ..report
        };
        assert!(report.summary().contains("1 task(s) marked synced"));
    }

    #[test]
    fn lease_outlasts_a_cycle_of_timeouts() {
        let lease = lease_for(Duration::from_secs(30));
        assert_eq!(lease, chrono::Duration::seconds(30 * 6 + 60));
    }

    #[test]
    fn cycle_state_defaults_to_idle() {
        assert_eq!(CycleState::default(), CycleState::Idle);
        assert_eq!(CycleState::CheckingRemote.to_string(), "checking_remote");
    }
}
