// Upstream capability seam.
// Everything the fetcher needs from GitHub, one call per request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::types::{Branch, Commit, Contributor, Issue, ItemState, PullRequest, RepoMetadata};

/// Maximum page size GitHub accepts on list endpoints.
pub const PER_PAGE: u32 = 100;

/// Parameters for one page of the commits listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    /// Branch name or SHA to list from; `None` lists the default branch.
    pub branch: Option<String>,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Raw GitHub REST calls.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn repo_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata>;

    async fn branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>>;

    /// One page (1-based) of commits matching `query`.
    async fn commits_page(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
        page: u32,
    ) -> Result<Vec<Commit>>;

    /// A single commit, including line statistics.
    async fn commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit>;

    async fn contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>>;

    async fn issues(&self, owner: &str, repo: &str, state: ItemState) -> Result<Vec<Issue>>;

    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: ItemState,
    ) -> Result<Vec<PullRequest>>;
}
