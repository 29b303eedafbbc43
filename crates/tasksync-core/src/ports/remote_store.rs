//! Remote store port (driven/secondary port)
//!
//! A minimal file-store contract over which snapshots are exchanged. The
//! primary implementation is WebDAV (`tasksync-webdav`).
//!
//! ## Design Notes
//!
//! - Errors are typed ([`RemoteError`]) because the orchestrator reacts
//!   differently to a missing file than to an unreachable server.
//! - Implementations do not retry; the next sync cycle is the retry.
//! - `upload` is at-least-once: overwriting identical content is harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::connection::RemoteConnectionConfig;

/// Failure classes of remote operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network error, timeout or server-side failure
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Authentication, permission or quota refusal
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// The requested path does not exist
    #[error("remote path not found: {0}")]
    NotFound(String),
}

#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Whether a file exists at `path`
    async fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Last modification time of the file at `path`
    async fn modified_time(&self, path: &str) -> Result<DateTime<Utc>, RemoteError>;

    /// Create or overwrite the file at `path`
    async fn upload(&self, path: &str, data: &[u8]) -> Result<(), RemoteError>;

    /// Full contents of the file at `path`
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Opens remote stores from user-supplied connection settings
#[async_trait::async_trait]
pub trait IRemoteConnector: Send + Sync {
    /// Verify the settings against the server and return a ready store
    async fn connect(
        &self,
        config: &RemoteConnectionConfig,
    ) -> Result<Arc<dyn IRemoteStore>, RemoteError>;
}
