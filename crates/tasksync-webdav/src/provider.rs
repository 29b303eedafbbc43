//! WebDAV implementations of the remote store ports
//!
//! [`WebDavRemoteStore`] fulfils `IRemoteStore` on top of [`WebDavClient`];
//! [`WebDavConnector`] verifies connection settings and prepares the
//! remote collection before handing out a store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::ports::{IRemoteConnector, IRemoteStore, RemoteError};

use crate::client::{last_modified, WebDavClient};

/// Remote store backed by a WebDAV server
pub struct WebDavRemoteStore {
    client: WebDavClient,
}

impl WebDavRemoteStore {
    pub fn new(client: WebDavClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &WebDavClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteStore for WebDavRemoteStore {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        let found = self.client.head(path).await?.is_some();
        debug!(path, found, "Checked remote file");
        Ok(found)
    }

    async fn modified_time(&self, path: &str) -> Result<DateTime<Utc>, RemoteError> {
        let response = self
            .client
            .head(path)
            .await?
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        last_modified(&response, path)
    }

    async fn upload(&self, path: &str, data: &[u8]) -> Result<(), RemoteError> {
        self.client.put(path, data).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.client.get(path).await
    }
}

/// Opens [`WebDavRemoteStore`]s and ensures the sync collection exists
pub struct WebDavConnector {
    timeout: Duration,
    remote_dir: String,
}

impl WebDavConnector {
    /// `remote_dir` is created on connect if missing
    pub fn new(timeout: Duration, remote_dir: impl Into<String>) -> Self {
        Self {
            timeout,
            remote_dir: remote_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl IRemoteConnector for WebDavConnector {
    async fn connect(
        &self,
        config: &RemoteConnectionConfig,
    ) -> Result<Arc<dyn IRemoteStore>, RemoteError> {
        config
            .validate()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let client = WebDavClient::new(config, self.timeout)?;

        // Fails fast on a wrong host or wrong credentials.
        client.propfind("/").await?;

        let dir = self.remote_dir.trim_end_matches('/');
        if !dir.is_empty() {
            client.mkcol(dir).await?;
        }

        info!(
            host = %client.base_url(),
            username = %config.username,
            remote_dir = %self.remote_dir,
            "Connected to WebDAV server"
        );
        Ok(Arc::new(WebDavRemoteStore::new(client)))
    }
}
