//! Database connection pool
//!
//! Wraps SQLx's `SqlitePool` so that every pool handed to the repository
//! has foreign keys enabled and the task schema applied.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

const INITIAL_MIGRATION: &str = include_str!("migrations/20250301_initial.sql");

/// Pool of SQLite connections to the task database
///
/// File databases use WAL so readers never block on the writer, up to
/// 5 connections and a 5-second busy timeout. In-memory databases use a
/// single connection since each connection would otherwise see its own
/// empty database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if needed) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or file cannot be
    /// created or opened, `CacheError::MigrationFailed` if the schema
    /// cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = Self::open(options, 5).await.map_err(|e| {
            CacheError::ConnectionFailed(format!(
                "Failed to open task database at {}: {}",
                db_path.display(),
                e
            ))
        })?;
        Self::migrate(&pool).await?;

        tracing::info!(path = %db_path.display(), "Task database opened");
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        let pool = Self::open(options, 1).await.map_err(|e| {
            CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
        })?;
        Self::migrate(&pool).await?;

        tracing::debug!("In-memory task database initialized");
        Ok(Self { pool })
    }

    /// Underlying SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn open(options: SqliteConnectOptions, max: u32) -> Result<SqlitePool, sqlx::Error> {
        SqlitePoolOptions::new()
            .max_connections(max)
            // An in-memory database disappears with its last connection.
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(INITIAL_MIGRATION)
            .execute(pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to apply initial schema: {}", e))
            })?;
        tracing::debug!("Task schema applied");
        Ok(())
    }
}
