//! Domain entities and value objects
//!
//! - [`Task`] / [`Subtask`] - the user's task collection
//! - [`Snapshot`] - immutable point-in-time export of the collection
//! - [`SyncLogEntry`] - append-only sync audit record

pub mod errors;
pub mod newtypes;
pub mod snapshot;
pub mod sync_log;
pub mod task;

pub use errors::DomainError;
pub use newtypes::{CycleId, TaskId};
pub use snapshot::Snapshot;
pub use sync_log::{ReasonCode, SyncLogEntry, SyncOutcomeKind};
pub use task::{
    clamp_progress, NewTask, Priority, Subtask, SubtaskStatus, SyncStatus, Task, DEADLINE_FORMAT,
};
