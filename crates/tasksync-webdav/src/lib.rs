//! tasksync WebDAV - Remote store adapter
//!
//! Implements the `IRemoteStore` and `IRemoteConnector` ports from
//! `tasksync-core` over WebDAV:
//!
//! - `exists` / `modified_time` → `HEAD` (`Last-Modified`)
//! - `upload` → `PUT`
//! - `download` → `GET`
//! - connect → `PROPFIND` on the base URL, then `MKCOL` on the sync collection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tasksync_core::connection::RemoteConnectionConfig;
//! use tasksync_core::ports::IRemoteConnector;
//! use tasksync_webdav::WebDavConnector;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RemoteConnectionConfig::new("https://dav.example.com/files/me", "me", "secret");
//! let connector = WebDavConnector::new(Duration::from_secs(30), "/tasks");
//! let store = connector.connect(&config).await?;
//! let _present = store.exists("/tasks/tasks.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod provider;

pub use client::WebDavClient;
pub use provider::{WebDavConnector, WebDavRemoteStore};
