//! Task repository port (driven/secondary port)
//!
//! The local store is the source of truth for the user's tasks. Besides
//! ordinary CRUD, it exposes the whole-collection operations the sync
//! engine needs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result`; the orchestrator classifies every failure here
//!   as a local store error, so adapters only need to add context.
//! - Implementations serialize all writers (and `export`) so a snapshot is
//!   never taken in the middle of an import.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{NewTask, Snapshot, SyncLogEntry, Task, TaskId};

#[async_trait::async_trait]
pub trait ITaskRepository: Send + Sync {
    // --- Sync operations ---

    /// Capture the full collection, stamped with the time its state became current
    async fn export(&self) -> anyhow::Result<Snapshot>;

    /// Atomically replace the whole collection with `snapshot`
    ///
    /// Sync versions never decrease: a task present both locally and in the
    /// snapshot keeps the larger version. Returns the number of tasks written.
    async fn import(&self, snapshot: &Snapshot) -> anyhow::Result<usize>;

    /// Record that the snapshot taken at `snapshot_as_of` reached the remote
    ///
    /// Tasks in `ids` that are still `Pending`/`Error` and were not modified
    /// after `snapshot_as_of` become `Synced` with their version incremented.
    /// When `remote_modified` is given and no local change happened since the
    /// snapshot, it becomes the collection's new as-of time. Returns the
    /// number of tasks marked.
    async fn mark_synced(
        &self,
        ids: &[TaskId],
        snapshot_as_of: DateTime<Utc>,
        remote_modified: Option<DateTime<Utc>>,
    ) -> anyhow::Result<usize>;

    /// Set a task to `Error` and append `entry` in one transaction
    async fn mark_task_error(&self, task_id: TaskId, entry: &SyncLogEntry) -> anyhow::Result<()>;

    /// Append a sync log entry, returning its id
    async fn append_sync_log(&self, entry: &SyncLogEntry) -> anyhow::Result<i64>;

    /// Most recent log entries, newest first
    async fn recent_sync_log(&self, limit: u32) -> anyhow::Result<Vec<SyncLogEntry>>;

    // --- Cycle lease ---

    /// Claim the store-wide sync lease for `owner` for `ttl`
    ///
    /// The lease is shared by every process using the same store, so at
    /// most one sync cycle runs against it at a time. Succeeds when no lease
    /// is held or the held one has expired; false when another owner holds
    /// a live lease.
    async fn try_acquire_sync_lease(&self, owner: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Give the lease up if `owner` still holds it
    async fn release_sync_lease(&self, owner: &str) -> anyhow::Result<()>;

    // --- Task CRUD ---

    /// Insert a task and return it with its assigned id
    async fn add_task(&self, task: &NewTask) -> anyhow::Result<Task>;

    async fn get_task(&self, id: TaskId) -> anyhow::Result<Option<Task>>;

    /// All tasks ordered by id
    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>>;

    /// Overwrite a task's user fields and mark it `Pending`; false if it does not exist
    async fn update_task(&self, task: &Task) -> anyhow::Result<bool>;

    /// Remove a task and its subtasks; false if it does not exist
    async fn delete_task(&self, id: TaskId) -> anyhow::Result<bool>;
}
