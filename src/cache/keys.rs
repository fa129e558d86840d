// Cache key builders.
// One constructor per cached operation; each encodes every parameter that shapes the result.

use std::fmt;

use crate::github::ItemState;
use crate::model::{TrackedRepository, Window};

/// Marker for "the repository's default branch". `~` cannot appear in a git ref name.
const DEFAULT_BRANCH: &str = "~default";

/// Deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full dashboard report over a window.
    pub fn repo_progress(window: &Window) -> Self {
        Self(format!("repo-progress:{}", window.key_part()))
    }

    pub fn repo_metadata(repo: &TrackedRepository) -> Self {
        Self(format!("repo:{}", repo_part(repo)))
    }

    pub fn branches(repo: &TrackedRepository) -> Self {
        Self(format!("branches:{}", repo_part(repo)))
    }

    /// Commits on `branch` (or the default branch) within `window`.
    pub fn commits(repo: &TrackedRepository, branch: Option<&str>, window: &Window) -> Self {
        Self(format!(
            "commits:{}:{}:{}",
            repo_part(repo),
            branch.unwrap_or(DEFAULT_BRANCH),
            window.key_part()
        ))
    }

    /// Line statistics for one commit. Commits are immutable so no window applies.
    pub fn commit_detail(repo: &TrackedRepository, sha: &str) -> Self {
        Self(format!("commit:{}:{}", repo_part(repo), sha))
    }

    pub fn contributors(repo: &TrackedRepository) -> Self {
        Self(format!("contributors:{}", repo_part(repo)))
    }

    pub fn issues(repo: &TrackedRepository, state: ItemState) -> Self {
        Self(format!("issues:{}:{}", repo_part(repo), state.as_param()))
    }

    pub fn pull_requests(repo: &TrackedRepository, state: ItemState) -> Self {
        Self(format!("pullRequests:{}:{}", repo_part(repo), state.as_param()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// GitHub owner and repository names are case-insensitive.
fn repo_part(repo: &TrackedRepository) -> String {
    format!(
        "{}:{}",
        repo.owner.to_ascii_lowercase(),
        repo.name.to_ascii_lowercase()
    )
}
