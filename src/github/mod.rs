//! GitHub API integration.
//!
//! Reads go through GraphQL, which is the only API that reports every
//! repository's merge settings in one paginated listing. Writes go through
//! the REST `PATCH /repos/{owner}/{repo}` endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use squash_only::cancel::CancellationToken;
//! use squash_only::github::{GitHubClient, IdentityOps, MergeSettingsOps, RepoQuery};
//!
//! let client = GitHubClient::new("ghp_your_token_here")?;
//! let login = client.authenticated_login()?;
//!
//! for repo in client.fetch_all_repositories(&login, &CancellationToken::new())? {
//!     println!("{}: {:?}", repo.full_name, repo.flags());
//! }
//!
//! let outcome = client.apply_squash_only(&format!("{}/dotfiles", login));
//! println!("{}", outcome);
//! # Ok::<(), squash_only::error::SquashError>(())
//! ```

mod client;
mod repos;
mod settings;
mod user;

pub use client::{DEFAULT_API_URL, GitHubClient, REQUEST_TIMEOUT};
pub use repos::{MergeFlags, PAGE_SIZE, RepoQuery, RepositoryPage, RepositoryPager, RepositoryRecord};
pub use settings::{MergeSettingsOps, MutationOutcome};
pub use user::IdentityOps;
