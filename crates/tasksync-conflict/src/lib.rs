//! tasksync Conflict - Snapshot conflict resolution
//!
//! Provides:
//! - Whole-collection last-writer-wins decisions ([`ConflictResolver`])
//! - Clock tolerance taken from configuration ([`ResolutionPolicy`])

pub mod error;
pub mod policy;
pub mod resolver;

pub use error::ConflictError;
pub use policy::ResolutionPolicy;
pub use resolver::{ConflictResolver, RemoteState, SyncAction};
