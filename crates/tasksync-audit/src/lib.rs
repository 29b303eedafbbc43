//! tasksync Audit - Sync log trail
//!
//! Provides:
//! - `AuditLogger`: records cycle and task outcomes in the sync log
//! - Integration with `ITaskRepository` for persistent storage

pub mod logger;

pub use logger::AuditLogger;
