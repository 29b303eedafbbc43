//! Error types for the conflict resolver

use thiserror::Error;

/// Errors that can occur while setting up conflict resolution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// `conflicts.tolerance_secs` is so wide that ordering becomes meaningless
    #[error("conflict tolerance of {given}s exceeds the maximum of {max}s")]
    ToleranceTooLarge { given: u64, max: u64 },
}
