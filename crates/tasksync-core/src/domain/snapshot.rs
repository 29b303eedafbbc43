//! Snapshot entity
//!
//! A snapshot is the full task collection at one instant. It is the unit
//! exchanged with the remote store and is immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::TaskId;
use super::task::Task;

/// Immutable point-in-time export of the task collection
///
/// `exported_at` is the instant at which this state became current: the
/// time of the last local change, or the remote modification time adopted
/// by the last successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    exported_at: DateTime<Utc>,
    tasks: Vec<Task>,
}

impl Snapshot {
    pub fn new(exported_at: DateTime<Utc>, tasks: Vec<Task>) -> Self {
        Self { exported_at, tasks }
    }

    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids of tasks whose status is not `Synced`
    pub fn unsynced_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| !t.is_synced())
            .map(Task::id)
            .collect()
    }

    /// Same tasks marked as reflecting the remote copy modified at `remote_modified`
    ///
    /// The returned snapshot is stamped with `remote_modified` so that a
    /// later export compares equal to the remote and does not bounce back.
    pub fn adopted_at(self, remote_modified: DateTime<Utc>) -> Self {
        let tasks = self
            .tasks
            .into_iter()
            .map(|t| t.synced_at(remote_modified))
            .collect();
        Self {
            exported_at: remote_modified,
            tasks,
        }
    }
}
