//! AuditLogger - sync log recording service
//!
//! Wraps `ITaskRepository::append_sync_log()` and `mark_task_error()` with
//! one method per kind of entry the orchestrator writes. All methods are
//! non-fatal: persistence errors are logged via `tracing::warn!` and never
//! propagated.

use std::sync::Arc;

use tasksync_core::{
    domain::{CycleId, ReasonCode, SyncLogEntry, TaskId},
    ports::ITaskRepository,
};

/// Append-only sync log writer backed by the task repository
///
/// A failing log write never breaks a sync cycle.
pub struct AuditLogger {
    repo: Arc<dyn ITaskRepository>,
}

impl AuditLogger {
    pub fn new(repo: Arc<dyn ITaskRepository>) -> Self {
        Self { repo }
    }

    async fn append(&self, entry: &SyncLogEntry) {
        if let Err(e) = self.repo.append_sync_log(entry).await {
            tracing::warn!(error = %e, "Failed to append sync log entry");
        }
    }

    // ========================================================================
    // Cycle level
    // ========================================================================

    /// Record a successful cycle
    pub async fn log_cycle_success(&self, cycle_id: CycleId, message: &str) {
        let entry = SyncLogEntry::success(message).with_cycle(cycle_id);
        self.append(&entry).await;
    }

    /// Record a failed cycle that cannot be attributed to one task
    pub async fn log_cycle_error(&self, cycle_id: CycleId, reason: ReasonCode, message: &str) {
        let entry = SyncLogEntry::error(reason, message).with_cycle(cycle_id);
        self.append(&entry).await;
    }

    // ========================================================================
    // Task level
    // ========================================================================

    /// Flag `task_id` as `Error` and record why, in one repository call
    ///
    /// If the task cannot be flagged (for example it was deleted meanwhile),
    /// the entry is still appended on its own.
    pub async fn log_task_error(
        &self,
        cycle_id: CycleId,
        task_id: TaskId,
        reason: ReasonCode,
        message: &str,
    ) {
        let entry = SyncLogEntry::error(reason, message)
            .with_cycle(cycle_id)
            .with_task(task_id);
        if let Err(e) = self.repo.mark_task_error(task_id, &entry).await {
            tracing::warn!(error = %e, task_id = %task_id, "Failed to flag task error");
            self.append(&entry).await;
        }
    }
}
