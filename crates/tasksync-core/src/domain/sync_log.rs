//! Sync log entries
//!
//! Append-only records of what each sync cycle did. Cycle-level entries
//! carry no task id; task-level entries name the task that failed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{CycleId, TaskId};

/// Message used when an error entry is built with an empty message
const UNSPECIFIED_ERROR: &str = "unspecified error";

/// Outcome recorded in a sync log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcomeKind {
    Success,
    Error,
}

impl SyncOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Machine-readable classification of a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The local repository could not be read or written
    LocalStore,
    /// A task could not be serialized
    Encode,
    /// The remote snapshot could not be parsed
    Decode,
    /// Network failure, timeout or server error
    RemoteUnavailable,
    /// The remote refused the request (auth, permissions, quota)
    RemoteRejected,
    /// A remote path that was expected to exist was missing
    NotFound,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalStore => "local_store",
            Self::Encode => "encode",
            Self::Decode => "decode",
            Self::RemoteUnavailable => "remote_unavailable",
            Self::RemoteRejected => "remote_rejected",
            Self::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local_store" => Some(Self::LocalStore),
            "encode" => Some(Self::Encode),
            "decode" => Some(Self::Decode),
            "remote_unavailable" => Some(Self::RemoteUnavailable),
            "remote_rejected" => Some(Self::RemoteRejected),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Short human explanation, shown by `tasksync log`
    pub fn description(&self) -> &'static str {
        match self {
            Self::LocalStore => "The local task database could not be read or written",
            Self::Encode => "A task could not be written to the snapshot",
            Self::Decode => "The remote snapshot is malformed",
            Self::RemoteUnavailable => "The remote server could not be reached",
            Self::RemoteRejected => "The remote server refused the request",
            Self::NotFound => "A remote file was missing",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only record in the sync log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    id: Option<i64>,
    cycle_id: Option<CycleId>,
    task_id: Option<TaskId>,
    timestamp: DateTime<Utc>,
    outcome: SyncOutcomeKind,
    reason: Option<ReasonCode>,
    message: String,
}

impl SyncLogEntry {
    /// Successful cycle-level entry
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            id: None,
            cycle_id: None,
            task_id: None,
            timestamp: Utc::now(),
            outcome: SyncOutcomeKind::Success,
            reason: None,
            message: message.into(),
        }
    }

    /// Failed entry; an empty message is replaced so errors are never silent
    pub fn error(reason: ReasonCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = UNSPECIFIED_ERROR.to_string();
        }
        Self {
            id: None,
            cycle_id: None,
            task_id: None,
            timestamp: Utc::now(),
            outcome: SyncOutcomeKind::Error,
            reason: Some(reason),
            message,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_cycle(mut self, cycle_id: CycleId) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn cycle_id(&self) -> Option<CycleId> {
        self.cycle_id
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn outcome(&self) -> SyncOutcomeKind {
        self.outcome
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.outcome == SyncOutcomeKind::Error
    }
}
