//! tasksync Sync - Snapshot synchronization engine
//!
//! Provides:
//! - Whole-collection last-writer-wins synchronization with a WebDAV-like store
//! - One cycle at a time, with an observable cycle state
//! - Periodic and on-demand scheduling
//!
//! ## Modules
//!
//! - [`orchestrator`] - Runs one sync cycle: export, upload, check, download
//! - [`scheduler`] - Triggers cycles on an interval and on request

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{CyclePermit, CycleReport, CycleState, SyncOrchestrator, SyncOutcome};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use tasksync_conflict::SyncAction;

use thiserror::Error;

use tasksync_core::codec::{DecodeError, EncodeError};
use tasksync_core::domain::{ReasonCode, TaskId};
use tasksync_core::ports::RemoteError;

/// Errors that end a sync cycle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The local repository failed to export, import or record state
    #[error("local store error: {0}")]
    LocalStore(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Network failure, timeout or server error
    #[error("{0}")]
    RemoteUnavailable(String),

    /// The remote refused the request
    #[error("{0}")]
    RemoteRejected(String),

    /// An expected remote file was missing
    #[error("{0}")]
    NotFound(String),

    /// No remote connection is configured
    #[error("not connected to a remote store")]
    NotConnected,
}

impl SyncError {
    pub(crate) fn local(err: anyhow::Error) -> Self {
        Self::LocalStore(format!("{err:#}"))
    }

    /// Reason recorded in the sync log; `None` for [`SyncError::NotConnected`],
    /// which is reported as a skipped cycle rather than a failure
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Self::LocalStore(_) => Some(ReasonCode::LocalStore),
            Self::Encode(_) => Some(ReasonCode::Encode),
            Self::Decode(_) => Some(ReasonCode::Decode),
            Self::RemoteUnavailable(_) => Some(ReasonCode::RemoteUnavailable),
            Self::RemoteRejected(_) => Some(ReasonCode::RemoteRejected),
            Self::NotFound(_) => Some(ReasonCode::NotFound),
            Self::NotConnected => None,
        }
    }

    /// Local task the failure is attributed to, if any
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Encode(e) => e.task_id(),
            _ => None,
        }
    }
}

/// Keeps the remote error text verbatim
impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        match err {
            RemoteError::Unavailable(_) => Self::RemoteUnavailable(message),
            RemoteError::Rejected(_) => Self::RemoteRejected(message),
            RemoteError::NotFound(_) => Self::NotFound(message),
        }
    }
}
