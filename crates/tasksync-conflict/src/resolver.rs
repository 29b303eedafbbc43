//! Last-writer-wins resolver
//!
//! Compares the local snapshot's as-of time with the remote canonical
//! file's modification time and picks a direction for the whole
//! collection. The decision is a pure function of its inputs; the
//! orchestrator performs the resulting I/O.
//!
//! Ties favor the local side so both replicas converge. A tie only
//! becomes [`SyncAction::NoOp`] when the local as-of time is exactly the
//! remote modification time and every local task is already synced. The
//! local side then still holds the state it adopted from the remote, and
//! there is nothing to publish or mark. Any local change since then moves
//! the as-of time, even one that leaves no unsynced task behind such as a
//! deletion.

use chrono::{DateTime, Utc};
use tracing::debug;

use tasksync_core::domain::Snapshot;

use crate::policy::ResolutionPolicy;

/// What the remote canonical file looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    /// No canonical file yet (first sync)
    Absent,
    Present { modified: DateTime<Utc> },
}

/// Direction chosen for the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Publish the local snapshot as the canonical file
    UploadLocal,
    /// Replace the local collection with the canonical file
    DownloadRemote,
    /// Both sides already hold the same state
    NoOp,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadLocal => "upload_local",
            Self::DownloadRemote => "download_remote",
            Self::NoOp => "no_op",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides between local and remote snapshots
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    policy: ResolutionPolicy,
}

impl ConflictResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Pick the action for `local` against the remote state
    pub fn resolve(&self, local: &Snapshot, remote: RemoteState) -> SyncAction {
        let action = self.decide(local, remote);
        debug!(
            local_as_of = %local.exported_at(),
            remote = ?remote,
            action = %action,
            "Resolved snapshot direction"
        );
        action
    }

    fn decide(&self, local: &Snapshot, remote: RemoteState) -> SyncAction {
        let remote = match remote {
            RemoteState::Absent => return SyncAction::UploadLocal,
            RemoteState::Present { modified } => modified,
        };

        let delta = local.exported_at() - remote;
        if delta > self.policy.tolerance {
            SyncAction::UploadLocal
        } else if -delta > self.policy.tolerance {
            SyncAction::DownloadRemote
        } else if local.exported_at() == remote && local.unsynced_ids().is_empty() {
            SyncAction::NoOp
        } else {
            SyncAction::UploadLocal
        }
    }
}
