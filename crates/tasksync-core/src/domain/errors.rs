//! Domain error types
//!
//! Validation failures for tasks, identifiers and connection settings.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Task name is empty or whitespace only
    #[error("Task name must not be empty")]
    EmptyName,

    /// Deadline is not a `YYYY-MM-DD` calendar date
    #[error("Invalid deadline '{0}': expected YYYY-MM-DD")]
    InvalidDeadline(String),

    /// Progress outside `0..=100`
    #[error("Progress {0} is outside 0..=100")]
    InvalidProgress(u8),

    /// Unknown enum value while parsing
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// The field being parsed
        field: &'static str,
        /// The rejected input
        value: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Remote connection settings are unusable
    #[error("Invalid connection settings: {0}")]
    InvalidConnection(String),
}
