//! # squash-only
//!
//! Reconfigures every GitHub repository owned by the authenticated user so
//! that only squash merges are allowed.
//!
//! A run:
//! - resolves the token's owner (`GET /user`)
//! - pages through their repositories and merge settings over GraphQL
//! - classifies each one with [`policy::classify`]
//! - patches the ones that are not yet squash-only over REST
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use squash_only::prelude::*;
//!
//! let client = GitHubClient::from_env()?;
//! let cancel = CancellationToken::new();
//!
//! let summary = SyncRunner::new(&client, SyncConfig::new(), cancel).run()?;
//! println!("{}", summary);
//! # Ok::<(), squash_only::error::SquashError>(())
//! ```
//!
//! ## Force mode
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use squash_only::prelude::*;
//!
//! // Re-apply the policy to every owned repository, two seconds apart
//! let config = SyncConfig::new().force().throttle(Duration::from_secs(2));
//! let summary = run_sync(&GitHubClient::from_env()?, config, CancellationToken::new())?;
//! assert_eq!(summary.counters.already_compliant, 0);
//! # Ok::<(), squash_only::error::SquashError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod github;
pub mod policy;
pub mod sync;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cancel::{CancellationToken, INTERRUPTED_EXIT_CODE, install_interrupt_handler};
    pub use crate::config::{DEFAULT_THROTTLE, SyncConfig, parse_sleep_seconds};
    pub use crate::error::{Result, SquashError};
    pub use crate::github::{
        GitHubClient, IdentityOps, MergeFlags, MergeSettingsOps, MutationOutcome, RepoQuery,
        RepositoryPage, RepositoryRecord,
    };
    pub use crate::policy::{Classification, TARGET_POLICY, classify};
    pub use crate::sync::{SyncCounters, SyncEvent, SyncRunner, SyncSummary, run_sync};
}

pub use prelude::*;
