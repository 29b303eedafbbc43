//! tasksync Cache - Local task store
//!
//! SQLite-based persistence for:
//! - Tasks and their subtasks
//! - Per-task sync bookkeeping (status, version, last sync)
//! - The collection's as-of time used for conflict resolution
//! - The append-only sync log
//!
//! ## Architecture
//!
//! This crate implements the `ITaskRepository` port from `tasksync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tasksync_cache::{DatabasePool, SqliteTaskRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/tasksync/tasks.db")).await?;
//! let repo = SqliteTaskRepository::new(pool.pool().clone());
//! // Use repo as ITaskRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteTaskRepository;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
