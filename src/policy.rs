//! The squash-only policy and per-repository classification.

use std::fmt;

use crate::github::{MergeFlags, RepositoryRecord};

/// Squash merges on, merge commits and rebase merges off.
pub const TARGET_POLICY: MergeFlags = MergeFlags {
    squash: true,
    merge_commit: false,
    rebase: false,
};

/// What a run should do with one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Owned by someone other than the authenticated user.
    OutOfScope,
    /// Already squash-only and not forced.
    AlreadyCompliant,
    /// Needs a settings update.
    NeedsMutation,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OutOfScope => "not owned",
            Self::AlreadyCompliant => "already squash-only",
            Self::NeedsMutation => "needs update",
        };
        f.write_str(label)
    }
}

/// Whether `flags` already match [`TARGET_POLICY`].
pub fn is_compliant(flags: MergeFlags) -> bool {
    flags == TARGET_POLICY
}

/// Decide what to do with `record`.
///
/// Ownership is an exact login match. Repositories that merely grant the
/// user admin rights are never touched. Under `force`, every owned
/// repository is updated regardless of its current flags.
pub fn classify(record: &RepositoryRecord, authenticated_login: &str, force: bool) -> Classification {
    if record.owner_login != authenticated_login {
        Classification::OutOfScope
    } else if !force && is_compliant(record.flags()) {
        Classification::AlreadyCompliant
    } else {
        Classification::NeedsMutation
    }
}
