//! tasksync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Task`, `Subtask`, `Snapshot`, `SyncLogEntry`
//! - **Snapshot codec** - deterministic `encode` / all-or-nothing `decode`
//! - **Port definitions** - Traits for adapters: `ITaskRepository`, `IRemoteStore`, `IRemoteConnector`
//! - **Configuration** - `Config` (YAML) and the separate `RemoteConnectionConfig`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`tasksync-cache` for SQLite, `tasksync-webdav` for the remote store).

pub mod codec;
pub mod config;
pub mod connection;
pub mod domain;
pub mod ports;
