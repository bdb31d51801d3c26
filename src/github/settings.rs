//! Merge-settings mutation over the REST API.

use std::fmt;

use reqwest::StatusCode;

use crate::github::{GitHubClient, MergeFlags};
use crate::policy::TARGET_POLICY;

/// Result of a single settings update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The provider accepted the update.
    Applied,
    /// The update was rejected or never completed.
    Failed {
        /// HTTP status, if a response arrived at all.
        status: Option<StatusCode>,
        reason: String,
    },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Classify a response status.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Self::Applied
        } else {
            Self::Failed {
                status: Some(status),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            }
        }
    }
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "updated"),
            Self::Failed {
                status: Some(status),
                reason,
            } => write!(f, "failed (HTTP {}: {})", status.as_u16(), reason),
            Self::Failed { status: None, reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Repository settings updates.
pub trait MergeSettingsOps {
    /// Set `full_name` (`owner/name`) to the squash-only policy.
    ///
    /// Never errors: transport problems and timeouts come back as
    /// [`MutationOutcome::Failed`].
    fn apply_squash_only(&self, full_name: &str) -> MutationOutcome;
}

impl MergeSettingsOps for GitHubClient {
    fn apply_squash_only(&self, full_name: &str) -> MutationOutcome {
        let endpoint = format!("/repos/{}", full_name);
        match self.patch::<MergeFlags>(&endpoint, &TARGET_POLICY) {
            Ok(status) => MutationOutcome::from_status(status),
            Err(e) => MutationOutcome::Failed {
                status: None,
                reason: e.to_string(),
            },
        }
    }
}
