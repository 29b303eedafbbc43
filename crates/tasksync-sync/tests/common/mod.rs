//! Shared fakes for sync integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Semaphore;

use tasksync_cache::{DatabasePool, SqliteTaskRepository};
use tasksync_core::codec;
use tasksync_core::config::{Config, ConfigBuilder};
use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::domain::{NewTask, Snapshot, SyncLogEntry, Task, TaskId};
use tasksync_core::ports::{IRemoteConnector, IRemoteStore, ITaskRepository, RemoteError};
use tasksync_sync::SyncOrchestrator;

pub const EXPORT_PATH: &str = "/tasks/tasks_export.json";
pub const CANONICAL_PATH: &str = "/tasks/tasks.json";

// ============================================================================
// Remote store
// ============================================================================

/// In-memory remote store with failure injection
///
/// Uploaded files get a whole-second modification time, like most WebDAV
/// servers report, unless a fixed time is set with [`set_clock`].
#[derive(Default)]
pub struct FakeRemoteStore {
    files: Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
    clock: Mutex<Option<DateTime<Utc>>>,
    upload_error: Mutex<Option<RemoteError>>,
    /// When set, uploads wait for a permit
    upload_gate: Mutex<Option<Arc<Semaphore>>>,
    hang: Mutex<bool>,
    /// When set, the next download finds its file deleted
    vanish_on_download: Mutex<bool>,
    uploads: AtomicUsize,
    calls: AtomicUsize,
    active_uploads: AtomicUsize,
    max_active_uploads: AtomicUsize,
}

impl FakeRemoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Place a file on the remote as if another client uploaded it
    pub fn put_file(&self, path: &str, data: Vec<u8>, modified: DateTime<Utc>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (data, modified));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).map(|(d, _)| d.clone())
    }

    pub fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.files.lock().unwrap().get(path).map(|(_, m)| *m)
    }

    pub fn set_clock(&self, at: DateTime<Utc>) {
        *self.clock.lock().unwrap() = Some(at);
    }

    pub fn fail_uploads(&self, error: RemoteError) {
        *self.upload_error.lock().unwrap() = Some(error);
    }

    pub fn heal(&self) {
        *self.upload_error.lock().unwrap() = None;
    }

    /// Make every call wait forever
    pub fn hang(&self) {
        *self.hang.lock().unwrap() = true;
    }

    /// Delete the requested file right before the next download reads it,
    /// as if another client removed it after it was stat'ed
    pub fn vanish_on_download(&self) {
        *self.vanish_on_download.lock().unwrap() = true;
    }

    /// Hold uploads until [`release_uploads`] is called
    pub fn block_uploads(&self) {
        *self.upload_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_uploads(&self) {
        if let Some(gate) = self.upload_gate.lock().unwrap().take() {
            gate.add_permits(1024);
        }
    }

    /// Successful uploads so far
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Calls of any kind so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_active_uploads.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hang = *self.hang.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock
            .lock()
            .unwrap()
            .unwrap_or_else(|| Utc::now().trunc_subsecs(0))
    }
}

#[async_trait::async_trait]
impl IRemoteStore for FakeRemoteStore {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        self.enter().await;
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn modified_time(&self, path: &str) -> Result<DateTime<Utc>, RemoteError> {
        self.enter().await;
        self.modified(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn upload(&self, path: &str, data: &[u8]) -> Result<(), RemoteError> {
        self.enter().await;

        let active = self.active_uploads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_uploads.fetch_max(active, Ordering::SeqCst);

        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.active_uploads.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.upload_error.lock().unwrap().clone() {
            return Err(err);
        }
        let modified = self.now();
        self.put_file(path, data.to_vec(), modified);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.enter().await;
        if std::mem::take(&mut *self.vanish_on_download.lock().unwrap()) {
            self.files.lock().unwrap().remove(path);
        }
        self.file(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

/// Connector that hands out one shared [`FakeRemoteStore`]
pub struct FakeConnector {
    store: Arc<FakeRemoteStore>,
    error: Mutex<Option<RemoteError>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(store: Arc<FakeRemoteStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            error: Mutex::new(None),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn refuse(&self, error: RemoteError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IRemoteConnector for FakeConnector {
    async fn connect(
        &self,
        _config: &RemoteConnectionConfig,
    ) -> Result<Arc<dyn IRemoteStore>, RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.store.clone())
    }
}

// ============================================================================
// Local repository
// ============================================================================

/// Minimal in-memory repository for timing tests
///
/// Unlike the SQLite repository it never leaves the runtime, so it is safe
/// with a paused clock.
#[derive(Default)]
pub struct MemoryRepository {
    tasks: Mutex<Vec<Task>>,
    as_of: Mutex<Option<DateTime<Utc>>>,
    log: Mutex<Vec<SyncLogEntry>>,
    lease: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<SyncLogEntry> {
        self.log.lock().unwrap().clone()
    }

    /// Hold the sync lease as another process would
    pub fn hold_lease(&self, owner: &str) {
        *self.lease.lock().unwrap() =
            Some((owner.to_string(), Utc::now() + chrono::Duration::hours(1)));
    }

    pub fn lease_owner(&self) -> Option<String> {
        self.lease.lock().unwrap().as_ref().map(|(o, _)| o.clone())
    }

    fn as_of(&self) -> DateTime<Utc> {
        self.as_of
            .lock()
            .unwrap()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ITaskRepository for MemoryRepository {
    async fn export(&self) -> anyhow::Result<Snapshot> {
        Ok(Snapshot::new(self.as_of(), self.tasks.lock().unwrap().clone()))
    }

    async fn import(&self, snapshot: &Snapshot) -> anyhow::Result<usize> {
        *self.tasks.lock().unwrap() = snapshot.tasks().to_vec();
        *self.as_of.lock().unwrap() = Some(snapshot.exported_at());
        Ok(snapshot.len())
    }

    async fn mark_synced(
        &self,
        ids: &[TaskId],
        _snapshot_as_of: DateTime<Utc>,
        remote_modified: Option<DateTime<Utc>>,
    ) -> anyhow::Result<usize> {
        let at = remote_modified.unwrap_or_else(Utc::now);
        let mut tasks = self.tasks.lock().unwrap();
        let mut marked = 0;
        for task in tasks.iter_mut().filter(|t| ids.contains(&t.id())) {
            let version = task.sync_version() + 1;
            *task = task
                .clone()
                .with_sync_state(tasksync_core::domain::SyncStatus::Synced, version, Some(at));
            marked += 1;
        }
        if let Some(remote) = remote_modified {
            *self.as_of.lock().unwrap() = Some(remote);
        }
        Ok(marked)
    }

    async fn mark_task_error(&self, _task_id: TaskId, entry: &SyncLogEntry) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> anyhow::Result<i64> {
        let mut log = self.log.lock().unwrap();
        log.push(entry.clone());
        Ok(log.len() as i64)
    }

    async fn recent_sync_log(&self, limit: u32) -> anyhow::Result<Vec<SyncLogEntry>> {
        Ok(self
            .log()
            .into_iter()
            .rev()
            .take(limit as usize)
            .collect())
    }

    async fn try_acquire_sync_lease(
        &self,
        owner: &str,
        ttl: chrono::Duration,
    ) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut lease = self.lease.lock().unwrap();
        if matches!(&*lease, Some((_, expires)) if *expires > now) {
            return Ok(false);
        }
        *lease = Some((owner.to_string(), now + ttl));
        Ok(true)
    }

    async fn release_sync_lease(&self, owner: &str) -> anyhow::Result<()> {
        let mut lease = self.lease.lock().unwrap();
        if matches!(&*lease, Some((held, _)) if held == owner) {
            *lease = None;
        }
        Ok(())
    }

    async fn add_task(&self, task: &NewTask) -> anyhow::Result<Task> {
        let mut tasks = self.tasks.lock().unwrap();
        let id = TaskId::new(tasks.len() as i64 + 1);
        let created = Task::new(id, task.name.clone(), Utc::now());
        tasks.push(created.clone());
        *self.as_of.lock().unwrap() = Some(Utc::now());
        Ok(created)
    }

    async fn get_task(&self, id: TaskId) -> anyhow::Result<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id() == id)
            .cloned())
    }

    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn update_task(&self, _task: &Task) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn delete_task(&self, _id: TaskId) -> anyhow::Result<bool> {
        Ok(false)
    }
}

// ============================================================================
// Setup helpers
// ============================================================================

pub fn test_config() -> Config {
    ConfigBuilder::new().remote_timeout_secs(5).build()
}

pub fn connection() -> RemoteConnectionConfig {
    RemoteConnectionConfig::new("https://dav.example.com/remote.php/dav", "alice", "secret")
}

pub async fn sqlite_repository() -> Arc<SqliteTaskRepository> {
    let pool = DatabasePool::in_memory().await.expect("in-memory database");
    Arc::new(SqliteTaskRepository::new(pool.pool().clone()))
}

/// Orchestrator over a SQLite repository, connected to a fresh fake store
pub async fn connected_orchestrator() -> (
    Arc<SyncOrchestrator>,
    Arc<SqliteTaskRepository>,
    Arc<FakeRemoteStore>,
) {
    let repo = sqlite_repository().await;
    let store = FakeRemoteStore::new();
    let connector = FakeConnector::new(store.clone());
    let orchestrator = SyncOrchestrator::new(repo.clone(), connector, &test_config())
        .expect("valid configuration");
    orchestrator
        .connect(connection())
        .await
        .expect("fake connector accepts");
    (Arc::new(orchestrator), repo, store)
}

/// Encoded snapshot holding one task per name, ids starting at 1
pub fn remote_snapshot(names: &[&str], exported_at: DateTime<Utc>) -> Vec<u8> {
    let tasks = names
        .iter()
        .enumerate()
        .map(|(i, name)| Task::new(TaskId::new(i as i64 + 1), *name, exported_at))
        .collect();
    codec::encode(&Snapshot::new(exported_at, tasks)).expect("valid snapshot")
}
