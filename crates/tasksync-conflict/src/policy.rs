//! Resolution policy
//!
//! Turns the `conflicts` configuration section into the parameters the
//! resolver works with.

use chrono::Duration;

use tasksync_core::config::{ConflictsConfig, MAX_TOLERANCE_SECS};

use crate::error::ConflictError;

/// Parameters of the last-writer-wins decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    /// Timestamps closer than this compare as equal
    pub tolerance: Duration,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            tolerance: Duration::zero(),
        }
    }
}

impl ResolutionPolicy {
    pub fn with_tolerance_secs(seconds: u64) -> Result<Self, ConflictError> {
        if seconds > MAX_TOLERANCE_SECS {
            return Err(ConflictError::ToleranceTooLarge {
                given: seconds,
                max: MAX_TOLERANCE_SECS,
            });
        }
        // Bounded above, so the conversion cannot fail.
        let seconds = i64::try_from(seconds).unwrap_or_default();
        Ok(Self {
            tolerance: Duration::seconds(seconds),
        })
    }

    pub fn from_config(config: &ConflictsConfig) -> Result<Self, ConflictError> {
        Self::with_tolerance_secs(config.tolerance_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_exact() {
        assert_eq!(ResolutionPolicy::default().tolerance, Duration::zero());
    }

    #[test]
    fn from_config_reads_tolerance() {
        let policy = ResolutionPolicy::from_config(&ConflictsConfig { tolerance_secs: 3 }).unwrap();
        assert_eq!(policy.tolerance, Duration::seconds(3));
    }

    #[test]
    fn default_config_matches_default_policy() {
        let policy = ResolutionPolicy::from_config(&ConflictsConfig::default()).unwrap();
        assert_eq!(policy, ResolutionPolicy::default());
    }

    #[test]
    fn rejects_tolerance_above_maximum() {
        assert_eq!(
            ResolutionPolicy::with_tolerance_secs(MAX_TOLERANCE_SECS + 1),
            Err(ConflictError::ToleranceTooLarge {
                given: MAX_TOLERANCE_SECS + 1,
                max: MAX_TOLERANCE_SECS,
            })
        );
        assert!(ResolutionPolicy::with_tolerance_secs(MAX_TOLERANCE_SECS).is_ok());
    }
}
