//! Task entity
//!
//! A task is the unit the user manages: a name, a priority, an optional
//! deadline, a progress percentage, free-text tags and an ordered list of
//! subtasks. Each task also carries its synchronization bookkeeping
//! (status, version, last successful sync).
//!
//! ## Invariants
//!
//! - `progress` is always within `0..=100`; every construction path clamps.
//! - `sync_version` never decreases.
//! - The deadline is stored as text so a malformed value coming from the
//!   store is representable; [`Task::validate`] rejects it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::TaskId;

/// Expected deadline format
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d";

/// Clamp an arbitrary integer into the valid progress range
pub fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

// ============================================================================
// Enumerations
// ============================================================================

/// User-assigned task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(DomainError::InvalidValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-task synchronization status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The remote copy reflects this task
    Synced,
    /// Local changes not yet confirmed on the remote
    #[default]
    Pending,
    /// The last cycle could not process this task
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "error" => Ok(Self::Error),
            other => Err(DomainError::InvalidValue {
                field: "sync_status",
                value: other.to_string(),
            }),
        }
    }
}

/// Completion state of a subtask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    Completed,
}

impl SubtaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for SubtaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(DomainError::InvalidValue {
                field: "subtask_status",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Subtask
// ============================================================================

/// A step of a task with a time target, owned by its parent task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub name: String,
    pub status: SubtaskStatus,
    /// Planned effort in minutes
    pub target_minutes: u32,
    /// Effort spent so far in minutes
    pub completed_minutes: u32,
}

impl Subtask {
    pub fn new(name: impl Into<String>, target_minutes: u32) -> Self {
        Self {
            name: name.into(),
            status: SubtaskStatus::Pending,
            target_minutes,
            completed_minutes: 0,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidValue {
                field: "subtask.name",
                value: self.name.clone(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Task
// ============================================================================

/// A task together with its synchronization bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    name: String,
    priority: Priority,
    deadline: Option<String>,
    progress: u8,
    tags: String,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    created_at: DateTime<Utc>,
    sync_status: SyncStatus,
    sync_version: u64,
    last_sync: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with default attributes
    pub fn new(id: TaskId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            priority: Priority::default(),
            deadline: None,
            progress: 0,
            tags: String::new(),
            subtasks: Vec::new(),
            created_at,
            sync_status: SyncStatus::Pending,
            sync_version: 0,
            last_sync: None,
        }
    }

    // --- Builders ---

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<String>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set progress, clamping into `0..=100`
    pub fn with_progress(mut self, progress: i64) -> Self {
        self.progress = clamp_progress(progress);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    /// Restore persisted sync bookkeeping
    pub fn with_sync_state(
        mut self,
        status: SyncStatus,
        version: u64,
        last_sync: Option<DateTime<Utc>>,
    ) -> Self {
        self.sync_status = status;
        self.sync_version = version;
        self.last_sync = last_sync;
        self
    }

    /// Mark as reflecting the remote copy observed at `at`
    pub fn synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.sync_status = SyncStatus::Synced;
        self.last_sync = Some(at);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn deadline(&self) -> Option<&str> {
        self.deadline.as_deref()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn tags(&self) -> &str {
        &self.tags
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    pub fn sync_version(&self) -> u64 {
        self.sync_version
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced
    }

    /// Check that the task can be written to a snapshot
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if self.progress > 100 {
            return Err(DomainError::InvalidProgress(self.progress));
        }
        if let Some(deadline) = &self.deadline {
            NaiveDate::parse_from_str(deadline, DEADLINE_FORMAT)
                .map_err(|_| DomainError::InvalidDeadline(deadline.clone()))?;
        }
        for subtask in &self.subtasks {
            subtask.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// NewTask
// ============================================================================

/// Attributes for a task that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub name: String,
    pub priority: Priority,
    pub deadline: Option<NaiveDate>,
    pub progress: u8,
    pub tags: String,
    pub subtasks: Vec<Subtask>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set progress, clamping into `0..=100`
    pub fn with_progress(mut self, progress: i64) -> Self {
        self.progress = clamp_progress(progress);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        for subtask in &self.subtasks {
            subtask.validate()?;
        }
        Ok(())
    }

    /// Deadline in its stored text form
    pub fn deadline_text(&self) -> Option<String> {
        self.deadline
            .map(|d| d.format(DEADLINE_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(TaskId::new(1), "Write report", Utc::now())
    }

    #[test]
    fn new_task_is_pending_with_zero_version() {
        let task = sample();
        assert_eq!(task.sync_status(), SyncStatus::Pending);
        assert_eq!(task.sync_version(), 0);
        assert!(task.last_sync().is_none());
        assert_eq!(task.priority(), Priority::Medium);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(sample().with_progress(150).progress(), 100);
        assert_eq!(sample().with_progress(-5).progress(), 0);
        assert_eq!(sample().with_progress(42).progress(), 42);
        assert_eq!(NewTask::new("x").with_progress(1000).progress, 100);
    }

    #[test]
    fn validate_rejects_empty_name() {
        let task = sample().with_name("   ");
        assert_eq!(task.validate(), Err(DomainError::EmptyName));
    }

    #[test]
    fn validate_rejects_malformed_deadline() {
        let task = sample().with_deadline(Some("2024-02-30".into()));
        assert!(matches!(
            task.validate(),
            Err(DomainError::InvalidDeadline(_))
        ));

        let ok = sample().with_deadline(Some("2024-02-29".into()));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unnamed_subtask() {
        let task = sample().with_subtasks(vec![Subtask::new("", 25)]);
        assert!(task.validate().is_err());
    }

    #[test]
    fn synced_at_sets_status_and_timestamp() {
        let at = Utc::now();
        let task = sample().synced_at(at);
        assert!(task.is_synced());
        assert_eq!(task.last_sync(), Some(at));
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("l".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn sync_status_string_roundtrip() {
        for status in [SyncStatus::Synced, SyncStatus::Pending, SyncStatus::Error] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
    }

    #[test]
    fn new_task_formats_deadline() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let new = NewTask::new("Plan").with_deadline(date);
        assert_eq!(new.deadline_text().as_deref(), Some("2025-03-09"));
    }
}
