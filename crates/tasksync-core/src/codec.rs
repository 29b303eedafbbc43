//! Snapshot codec
//!
//! Converts a [`Snapshot`] to and from the byte form exchanged with the
//! remote store. The format is a versioned JSON envelope:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "exported_at": "2025-01-01T10:00:00Z",
//!   "tasks": [ ... ]
//! }
//! ```
//!
//! Encoding is deterministic: the same snapshot always produces the same
//! bytes, so re-uploading an unchanged snapshot is a no-op for content.
//! Decoding is all-or-nothing: every task is validated before the
//! snapshot is built.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Snapshot, Task, TaskId};

/// Envelope version written by [`encode`]
pub const FORMAT_VERSION: u32 = 1;

/// File extension of exchanged snapshots
pub const FILE_EXTENSION: &str = "json";

/// Errors produced while encoding a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// A task failed validation
    #[error("task {task_id} cannot be encoded: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    /// The serializer itself failed
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),
}

impl EncodeError {
    /// The task responsible for the failure, when there is one
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::InvalidTask { task_id, .. } => Some(*task_id),
            Self::Serialization(_) => None,
        }
    }
}

/// Errors produced while decoding a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes are not a well-formed snapshot envelope
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// Envelope written by an incompatible format version
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    /// A task inside the envelope is invalid
    #[error("invalid task {task_id} in snapshot: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    /// The same task id appears more than once
    #[error("duplicate task {0} in snapshot")]
    DuplicateTask(TaskId),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    exported_at: &'a DateTime<Utc>,
    tasks: &'a [Task],
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    exported_at: DateTime<Utc>,
    tasks: Vec<Task>,
}

/// Serialize a snapshot for upload
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, EncodeError> {
    for task in snapshot.tasks() {
        task.validate().map_err(|e| EncodeError::InvalidTask {
            task_id: task.id(),
            reason: e.to_string(),
        })?;
    }

    let exported_at = snapshot.exported_at();
    let envelope = EnvelopeRef {
        format_version: FORMAT_VERSION,
        exported_at: &exported_at,
        tasks: snapshot.tasks(),
    };
    serde_json::to_vec_pretty(&envelope).map_err(|e| EncodeError::Serialization(e.to_string()))
}

/// Parse and validate a downloaded snapshot
pub fn decode(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
    // Peek at the version first so an incompatible envelope is reported as
    // such rather than as a field mismatch.
    let raw: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let version = raw
        .get("format_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| DecodeError::Malformed("missing format_version".to_string()))?;
    if version != u64::from(FORMAT_VERSION) {
        return Err(DecodeError::UnsupportedVersion(
            u32::try_from(version).unwrap_or(u32::MAX),
        ));
    }

    let envelope: Envelope =
        serde_json::from_value(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    debug_assert_eq!(envelope.format_version, FORMAT_VERSION);

    let mut seen = HashSet::with_capacity(envelope.tasks.len());
    for task in &envelope.tasks {
        task.validate().map_err(|e| DecodeError::InvalidTask {
            task_id: task.id(),
            reason: e.to_string(),
        })?;
        if !seen.insert(task.id()) {
            return Err(DecodeError::DuplicateTask(task.id()));
        }
    }

    Ok(Snapshot::new(envelope.exported_at, envelope.tasks))
}
