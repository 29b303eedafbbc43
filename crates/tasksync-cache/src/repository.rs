//! SQLite implementation of ITaskRepository
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                   |
//! |----------------------|----------|--------------------------------------------|
//! | TaskId               | INTEGER  | `as_i64()` / `TaskId::new()`               |
//! | CycleId              | TEXT     | UUID string via `to_string()` / `FromStr`  |
//! | DateTime<Utc>        | TEXT     | RFC 3339, UTC, microseconds                |
//! | Priority, SyncStatus | TEXT     | `as_str()` / `FromStr`                     |
//! | ReasonCode           | TEXT     | `as_str()` / `ReasonCode::parse`           |
//!
//! ## Concurrency
//!
//! Every write and `export` holds `write_lock`, so a snapshot can never be
//! taken halfway through an import. Multi-statement writes also run in a
//! transaction so readers outside this process see old or new state.
//!
//! ## As-of time
//!
//! `store_meta.as_of` is the instant the collection's current state dates
//! from. Local edits advance it strictly (never backwards, even if the
//! wall clock does); import and a confirmed upload set it to the remote
//! modification time.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use tasksync_core::domain::{
    clamp_progress, CycleId, NewTask, Priority, ReasonCode, Snapshot, Subtask, SubtaskStatus,
    SyncLogEntry, SyncOutcomeKind, SyncStatus, Task, TaskId,
};
use tasksync_core::ports::ITaskRepository;

use crate::CacheError;

const TASK_COLUMNS: &str = "id, name, priority, deadline, progress, tags, created_at, \
                            sync_status, sync_version, last_sync";

/// SQLite-backed task store
pub struct SqliteTaskRepository {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteTaskRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Current as-of time of the collection
    pub async fn as_of(&self) -> anyhow::Result<DateTime<Utc>> {
        let mut conn = self.pool.acquire().await?;
        Ok(read_as_of(&mut conn).await?)
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn ts_to_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_string(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("Invalid timestamp '{s}': {e}")))
}

/// Current time at the precision the store keeps
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn version_to_i64(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn row_to_task(row: &SqliteRow, subtasks: Vec<Subtask>) -> Result<Task, CacheError> {
    let id: i64 = row.try_get("id")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("sync_status")?;
    let created_at: String = row.try_get("created_at")?;
    let last_sync: Option<String> = row.try_get("last_sync")?;
    let version: i64 = row.try_get("sync_version")?;
    let progress: i64 = row.try_get("progress")?;

    let priority = Priority::from_str(&priority)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    let status = SyncStatus::from_str(&status)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    let last_sync = last_sync.as_deref().map(ts_from_string).transpose()?;

    Ok(
        Task::new(TaskId::new(id), row.try_get::<String, _>("name")?, ts_from_string(&created_at)?)
            .with_priority(priority)
            .with_deadline(row.try_get("deadline")?)
            .with_progress(progress)
            .with_tags(row.try_get::<String, _>("tags")?)
            .with_subtasks(subtasks)
            .with_sync_state(status, u64::try_from(version).unwrap_or(0), last_sync),
    )
}

fn row_to_subtask(row: &SqliteRow) -> Result<(i64, Subtask), CacheError> {
    let task_id: i64 = row.try_get("task_id")?;
    let status: String = row.try_get("status")?;
    let target: i64 = row.try_get("target_minutes")?;
    let completed: i64 = row.try_get("completed_minutes")?;
    let subtask = Subtask {
        name: row.try_get("name")?,
        status: SubtaskStatus::from_str(&status)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?,
        target_minutes: u32::try_from(target).unwrap_or(0),
        completed_minutes: u32::try_from(completed).unwrap_or(0),
    };
    Ok((task_id, subtask))
}

fn row_to_log_entry(row: &SqliteRow) -> Result<SyncLogEntry, CacheError> {
    let id: i64 = row.try_get("id")?;
    let cycle_id: Option<String> = row.try_get("cycle_id")?;
    let task_id: Option<i64> = row.try_get("task_id")?;
    let timestamp: String = row.try_get("timestamp")?;
    let outcome: String = row.try_get("outcome")?;
    let reason: Option<String> = row.try_get("reason")?;
    let message: String = row.try_get("message")?;

    let outcome = SyncOutcomeKind::parse(&outcome)
        .ok_or_else(|| CacheError::SerializationError(format!("Unknown outcome: {outcome}")))?;
    let mut entry = match outcome {
        SyncOutcomeKind::Success => SyncLogEntry::success(message),
        SyncOutcomeKind::Error => {
            let reason = reason
                .as_deref()
                .and_then(ReasonCode::parse)
                .unwrap_or(ReasonCode::LocalStore);
            SyncLogEntry::error(reason, message)
        }
    };
    entry = entry
        .with_id(id)
        .with_timestamp(ts_from_string(&timestamp)?);
    if let Some(cycle) = cycle_id {
        let cycle = CycleId::from_str(&cycle)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        entry = entry.with_cycle(cycle);
    }
    if let Some(task) = task_id {
        entry = entry.with_task(TaskId::new(task));
    }
    Ok(entry)
}

// ============================================================================
// Connection-level queries shared by pool reads and transactions
// ============================================================================

async fn read_as_of(conn: &mut SqliteConnection) -> Result<DateTime<Utc>, CacheError> {
    let value: String = sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'as_of'")
        .fetch_one(&mut *conn)
        .await?;
    ts_from_string(&value)
}

async fn write_as_of(conn: &mut SqliteConnection, as_of: &DateTime<Utc>) -> Result<(), CacheError> {
    sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES ('as_of', ?)")
        .bind(ts_to_string(as_of))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Advance the as-of time for a local change and return the stamp to use
///
/// The stamp is strictly after the previous as-of time so a local edit
/// always wins against the snapshot it was based on, even when the
/// adopted remote time is ahead of this machine's clock.
async fn touch_as_of(conn: &mut SqliteConnection) -> Result<DateTime<Utc>, CacheError> {
    let previous = read_as_of(conn).await?;
    let stamp = now().max(previous + Duration::microseconds(1));
    write_as_of(conn, &stamp).await?;
    Ok(stamp)
}

async fn load_subtasks(
    conn: &mut SqliteConnection,
    task_id: Option<i64>,
) -> Result<HashMap<i64, Vec<Subtask>>, CacheError> {
    let rows = match task_id {
        Some(id) => {
            sqlx::query(
                "SELECT task_id, name, status, target_minutes, completed_minutes \
                 FROM subtasks WHERE task_id = ? ORDER BY position",
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT task_id, name, status, target_minutes, completed_minutes \
                 FROM subtasks ORDER BY task_id, position",
            )
            .fetch_all(&mut *conn)
            .await?
        }
    };

    let mut by_task: HashMap<i64, Vec<Subtask>> = HashMap::new();
    for row in &rows {
        let (task_id, subtask) = row_to_subtask(row)?;
        by_task.entry(task_id).or_default().push(subtask);
    }
    Ok(by_task)
}

async fn load_tasks(conn: &mut SqliteConnection) -> Result<Vec<Task>, CacheError> {
    let rows = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))
        .fetch_all(&mut *conn)
        .await?;
    let mut subtasks = load_subtasks(conn, None).await?;

    rows.iter()
        .map(|row| -> Result<Task, CacheError> {
            let id: i64 = row.try_get("id")?;
            row_to_task(row, subtasks.remove(&id).unwrap_or_default())
        })
        .collect()
}

async fn insert_subtasks(
    conn: &mut SqliteConnection,
    task_id: i64,
    subtasks: &[Subtask],
) -> Result<(), CacheError> {
    for (position, subtask) in subtasks.iter().enumerate() {
        sqlx::query(
            "INSERT INTO subtasks \
             (task_id, position, name, status, target_minutes, completed_minutes) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(position as i64)
        .bind(&subtask.name)
        .bind(subtask.status.as_str())
        .bind(i64::from(subtask.target_minutes))
        .bind(i64::from(subtask.completed_minutes))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_log_entry(
    conn: &mut SqliteConnection,
    entry: &SyncLogEntry,
) -> Result<i64, CacheError> {
    let result = sqlx::query(
        "INSERT INTO sync_log (cycle_id, task_id, timestamp, outcome, reason, message) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.cycle_id().map(|c| c.to_string()))
    .bind(entry.task_id().map(|t| t.as_i64()))
    .bind(ts_to_string(&entry.timestamp()))
    .bind(entry.outcome().as_str())
    .bind(entry.reason().map(|r| r.as_str()))
    .bind(entry.message())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

// ============================================================================
// ITaskRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl ITaskRepository for SqliteTaskRepository {
    async fn export(&self) -> anyhow::Result<Snapshot> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let as_of = read_as_of(&mut tx).await?;
        let tasks = load_tasks(&mut tx).await?;
        tx.commit().await?;

        tracing::trace!(tasks = tasks.len(), as_of = %as_of, "Exported snapshot");
        Ok(Snapshot::new(as_of, tasks))
    }

    async fn import(&self, snapshot: &Snapshot) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing: HashMap<i64, i64> =
            sqlx::query_as::<_, (i64, i64)>("SELECT id, sync_version FROM tasks")
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        sqlx::query("DELETE FROM subtasks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM tasks").execute(&mut *tx).await?;

        let stamp = ts_to_string(&snapshot.exported_at());
        for task in snapshot.tasks() {
            let id = task.id().as_i64();
            let version = existing
                .get(&id)
                .copied()
                .unwrap_or(0)
                .max(version_to_i64(task.sync_version()));

            sqlx::query(
                "INSERT INTO tasks \
                 (id, name, priority, deadline, progress, tags, created_at, modified_at, \
                  sync_status, sync_version, last_sync) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(task.name())
            .bind(task.priority().as_str())
            .bind(task.deadline())
            .bind(i64::from(task.progress()))
            .bind(task.tags())
            .bind(ts_to_string(&task.created_at()))
            .bind(&stamp)
            .bind(task.sync_status().as_str())
            .bind(version)
            .bind(task.last_sync().map(|t| ts_to_string(&t)))
            .execute(&mut *tx)
            .await?;

            insert_subtasks(&mut tx, id, task.subtasks()).await?;
        }

        write_as_of(&mut tx, &snapshot.exported_at()).await?;
        tx.commit().await?;

        tracing::debug!(
            tasks = snapshot.len(),
            as_of = %snapshot.exported_at(),
            "Imported snapshot"
        );
        Ok(snapshot.len())
    }

    async fn mark_synced(
        &self,
        ids: &[TaskId],
        snapshot_as_of: DateTime<Utc>,
        remote_modified: Option<DateTime<Utc>>,
    ) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let cutoff = ts_to_string(&snapshot_as_of);
        let last_sync = ts_to_string(&remote_modified.unwrap_or_else(now));
        let mut marked = 0usize;
        for id in ids {
            let result = sqlx::query(
                "UPDATE tasks SET sync_status = 'synced', sync_version = sync_version + 1, \
                 last_sync = ? \
                 WHERE id = ? AND sync_status != 'synced' AND modified_at <= ?",
            )
            .bind(&last_sync)
            .bind(id.as_i64())
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;
            marked += result.rows_affected() as usize;
        }

        if let Some(remote) = remote_modified {
            // Only adopt the remote time if nothing changed locally since the export.
            let adopted = sqlx::query(
                "UPDATE store_meta SET value = ? WHERE key = 'as_of' AND value = ?",
            )
            .bind(ts_to_string(&remote))
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;
            tracing::trace!(
                adopted = adopted.rows_affected() > 0,
                remote = %remote,
                "Remote time adoption"
            );
        }

        tx.commit().await?;
        tracing::debug!(marked, "Marked tasks synced");
        Ok(marked)
    }

    async fn mark_task_error(&self, task_id: TaskId, entry: &SyncLogEntry) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE tasks SET sync_status = 'error' WHERE id = ?")
            .bind(task_id.as_i64())
            .execute(&mut *tx)
            .await?;
        insert_log_entry(&mut tx, entry).await?;

        tx.commit().await?;
        tracing::trace!(task_id = %task_id, "Task marked as error");
        Ok(())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> anyhow::Result<i64> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        let id = insert_log_entry(&mut conn, entry).await?;
        tracing::trace!(id, outcome = entry.outcome().as_str(), "Sync log entry appended");
        Ok(id)
    }

    async fn recent_sync_log(&self, limit: u32) -> anyhow::Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, cycle_id, task_id, timestamp, outcome, reason, message \
             FROM sync_log ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(row_to_log_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn try_acquire_sync_lease(&self, owner: &str, ttl: Duration) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let now = now();

        // One statement, so two processes cannot both see the lease free.
        let result = sqlx::query(
            "INSERT INTO sync_lease (id, owner, expires_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET owner = excluded.owner, expires_at = excluded.expires_at \
             WHERE sync_lease.expires_at <= ?",
        )
        .bind(owner)
        .bind(ts_to_string(&(now + ttl)))
        .bind(ts_to_string(&now))
        .execute(&self.pool)
        .await?;

        let acquired = result.rows_affected() > 0;
        tracing::trace!(owner, acquired, "Sync lease claim");
        Ok(acquired)
    }

    async fn release_sync_lease(&self, owner: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM sync_lease WHERE owner = ?")
            .bind(owner)
            .execute(&self.pool)
            .await?;
        tracing::trace!(owner, "Sync lease released");
        Ok(())
    }

    async fn add_task(&self, task: &NewTask) -> anyhow::Result<Task> {
        task.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let stamp = touch_as_of(&mut tx).await?;
        let created_at = ts_to_string(&stamp);

        let result = sqlx::query(
            "INSERT INTO tasks \
             (name, priority, deadline, progress, tags, created_at, modified_at, sync_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'pending')",
        )
        .bind(task.name.trim())
        .bind(task.priority.as_str())
        .bind(task.deadline_text())
        .bind(i64::from(clamp_progress(i64::from(task.progress))))
        .bind(&task.tags)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        insert_subtasks(&mut tx, id, &task.subtasks).await?;
        tx.commit().await?;

        tracing::debug!(task_id = id, "Task added");
        Ok(Task::new(TaskId::new(id), task.name.trim(), stamp)
            .with_priority(task.priority)
            .with_deadline(task.deadline_text())
            .with_progress(i64::from(task.progress))
            .with_tags(task.tags.clone())
            .with_subtasks(task.subtasks.clone()))
    }

    async fn get_task(&self, id: TaskId) -> anyhow::Result<Option<Task>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let mut subtasks = load_subtasks(&mut conn, Some(id.as_i64())).await?;
                let subtasks = subtasks.remove(&id.as_i64()).unwrap_or_default();
                Ok(Some(row_to_task(&row, subtasks)?))
            }
            None => Ok(None),
        }
    }

    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;
        Ok(load_tasks(&mut conn).await?)
    }

    async fn update_task(&self, task: &Task) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let id = task.id().as_i64();

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let stamp = touch_as_of(&mut tx).await?;
        sqlx::query(
            "UPDATE tasks SET name = ?, priority = ?, deadline = ?, progress = ?, tags = ?, \
             modified_at = ?, sync_status = 'pending' WHERE id = ?",
        )
        .bind(task.name())
        .bind(task.priority().as_str())
        .bind(task.deadline())
        .bind(i64::from(task.progress()))
        .bind(task.tags())
        .bind(ts_to_string(&stamp))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM subtasks WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_subtasks(&mut tx, id, task.subtasks()).await?;
        tx.commit().await?;

        tracing::debug!(task_id = id, "Task updated");
        Ok(true)
    }

    async fn delete_task(&self, id: TaskId) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM subtasks WHERE task_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        touch_as_of(&mut tx).await?;
        tx.commit().await?;

        tracing::debug!(task_id = %id, "Task deleted");
        Ok(true)
    }
}
