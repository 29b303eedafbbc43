//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on, with
//! implementations living in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITaskRepository`] - Local task store: snapshot export/import, sync bookkeeping, CRUD
//! - [`IRemoteStore`] - Remote file store holding exchanged snapshots
//! - [`IRemoteConnector`] - Builds an [`IRemoteStore`] from connection settings

pub mod remote_store;
pub mod task_repository;

pub use remote_store::{IRemoteConnector, IRemoteStore, RemoteError};
pub use task_repository::ITaskRepository;
