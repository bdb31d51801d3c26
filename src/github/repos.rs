//! Repository listing over the GraphQL API.
//!
//! The REST listing endpoints do not expose merge settings, so the query
//! side goes through GraphQL and walks the `repositories` connection with
//! its opaque `endCursor`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::{Result, SquashError};
use crate::github::GitHubClient;

/// Largest page the GraphQL API will serve.
pub const PAGE_SIZE: u32 = 100;

const REPOSITORIES_QUERY: &str = r#"
query($login: String!, $first: Int!, $after: String) {
  user(login: $login) {
    repositories(first: $first, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        owner { login }
        squashMergeAllowed
        mergeCommitAllowed
        rebaseMergeAllowed
      }
    }
  }
}
"#;

/// One repository and its current merge settings.
///
/// GraphQL reports the flags as `null` when the token cannot read them, so
/// each one stays optional until [`RepositoryRecord::flags`] normalizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub full_name: String,
    pub owner_login: String,
    pub squash_merge_allowed: Option<bool>,
    pub merge_commit_allowed: Option<bool>,
    pub rebase_merge_allowed: Option<bool>,
}

impl RepositoryRecord {
    /// Build a record from its owner, name and raw flags.
    pub fn new(
        owner: impl Into<String>,
        name: &str,
        squash: Option<bool>,
        merge_commit: Option<bool>,
        rebase: Option<bool>,
    ) -> Self {
        let owner_login = owner.into();
        Self {
            full_name: format!("{}/{}", owner_login, name),
            owner_login,
            squash_merge_allowed: squash,
            merge_commit_allowed: merge_commit,
            rebase_merge_allowed: rebase,
        }
    }

    /// The merge flags with absent values read as `false`.
    pub fn flags(&self) -> MergeFlags {
        MergeFlags {
            squash: self.squash_merge_allowed.unwrap_or(false),
            merge_commit: self.merge_commit_allowed.unwrap_or(false),
            rebase: self.rebase_merge_allowed.unwrap_or(false),
        }
    }
}

/// Normalized merge-strategy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeFlags {
    #[serde(rename = "allow_squash_merge")]
    pub squash: bool,
    #[serde(rename = "allow_merge_commit")]
    pub merge_commit: bool,
    #[serde(rename = "allow_rebase_merge")]
    pub rebase: bool,
}

/// A single page from the repositories connection.
#[derive(Debug, Clone, Default)]
pub struct RepositoryPage {
    pub records: Vec<RepositoryRecord>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Repository listing operations.
pub trait RepoQuery {
    /// Fetch one page of repositories for `login`, starting after `after`.
    fn fetch_repository_page(
        &self,
        login: &str,
        first: u32,
        after: Option<&str>,
    ) -> Result<RepositoryPage>;

    /// Fetch every repository for `login`, de-duplicated by full name.
    fn fetch_all_repositories(
        &self,
        login: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RepositoryRecord>> {
        let mut pager = RepositoryPager::new(self, login);
        let mut all = Vec::new();
        while let Some(records) = pager.next_page(cancel)? {
            all.extend(records);
        }
        Ok(all)
    }
}

#[derive(Serialize)]
struct Variables<'a> {
    login: &'a str,
    first: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryConnection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<RepositoryNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: String,
    owner: OwnerNode,
    squash_merge_allowed: Option<bool>,
    merge_commit_allowed: Option<bool>,
    rebase_merge_allowed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OwnerNode {
    login: String,
}

impl QueryData {
    fn into_page(self, login: &str) -> Result<RepositoryPage> {
        let user = self.user.ok_or_else(|| SquashError::GraphQl {
            messages: vec![format!("no user found for login '{}'", login)],
        })?;
        let connection = user.repositories;

        let records = connection
            .nodes
            .into_iter()
            .flatten()
            .map(|node| {
                RepositoryRecord::new(
                    node.owner.login,
                    &node.name,
                    node.squash_merge_allowed,
                    node.merge_commit_allowed,
                    node.rebase_merge_allowed,
                )
            })
            .collect();

        Ok(RepositoryPage {
            records,
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

impl RepoQuery for GitHubClient {
    fn fetch_repository_page(
        &self,
        login: &str,
        first: u32,
        after: Option<&str>,
    ) -> Result<RepositoryPage> {
        let data: QueryData =
            self.graphql(REPOSITORIES_QUERY, &Variables { login, first, after })?;
        data.into_page(login)
    }
}

/// Walks the repositories connection one page at a time.
///
/// The pager stops for good once the provider reports no next page, returns
/// an empty page, hands back a cursor it already served, or the run is
/// cancelled.
pub struct RepositoryPager<'a, Q: RepoQuery + ?Sized> {
    query: &'a Q,
    login: &'a str,
    page_size: u32,
    cursor: Option<String>,
    visited_cursors: HashSet<String>,
    seen: HashSet<String>,
    pages_fetched: u32,
    done: bool,
}

impl<'a, Q: RepoQuery + ?Sized> RepositoryPager<'a, Q> {
    /// Create a pager over `login`'s repositories.
    pub fn new(query: &'a Q, login: &'a str) -> Self {
        Self {
            query,
            login,
            page_size: PAGE_SIZE,
            cursor: None,
            visited_cursors: HashSet::new(),
            seen: HashSet::new(),
            pages_fetched: 0,
            done: false,
        }
    }

    /// Sets the page size, clamped to `1..=PAGE_SIZE`.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, PAGE_SIZE);
        self
    }

    /// Number of page requests issued so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetch the next page of not-yet-seen records.
    ///
    /// Returns `Ok(None)` when pagination is finished. No request is made
    /// once `cancel` has fired.
    pub fn next_page(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<RepositoryRecord>>> {
        if self.done {
            return Ok(None);
        }
        if cancel.is_cancelled() {
            tracing::debug!(login = self.login, "cancelled before next page request");
            self.done = true;
            return Ok(None);
        }

        let page = self
            .query
            .fetch_repository_page(self.login, self.page_size, self.cursor.as_deref())?;
        self.pages_fetched += 1;
        tracing::debug!(
            login = self.login,
            page = self.pages_fetched,
            count = page.records.len(),
            has_next_page = page.has_next_page,
            "fetched repository page"
        );

        if page.records.is_empty() {
            self.done = true;
            return Ok(None);
        }

        match (page.has_next_page, page.end_cursor) {
            (true, Some(cursor)) if !self.visited_cursors.contains(&cursor) => {
                self.visited_cursors.insert(cursor.clone());
                self.cursor = Some(cursor);
            }
            (true, _) => {
                tracing::warn!(
                    login = self.login,
                    "provider reported another page without an unvisited cursor; stopping"
                );
                self.done = true;
            }
            (false, _) => self.done = true,
        }

        let mut records = page.records;
        records.retain(|r| self.seen.insert(r.full_name.clone()));
        Ok(Some(records))
    }
}
