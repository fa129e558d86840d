// GitHub data fetcher.
// Cached, failure-isolated access to repository data. One repository's trouble never
// reaches the caller as an error unless the caller needs that data to proceed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::cache::{CacheAside, CacheKey};
use crate::error::{PulseError, Result};
use crate::model::{CommitRecord, TrackedRepository, Window};

use super::api::{CommitQuery, GitHubApi, PER_PAGE};
use super::types::{Contributor, Issue, ItemState, PullRequest, RepoMetadata};

/// Concurrent single-commit requests when collecting line statistics.
const COMMIT_DETAIL_CONCURRENCY: usize = 8;

/// Items gathered by [`paginate`], plus the error that cut it short, if any.
#[derive(Debug)]
pub struct Pagination<T> {
    pub items: Vec<T>,
    pub error: Option<PulseError>,
}

impl<T> Pagination<T> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetch pages 1, 2, 3, ... in order until a page holds fewer than `per_page` items.
///
/// A failing page ends the walk; everything gathered before it is kept.
pub async fn paginate<T, F, Fut>(per_page: usize, mut fetch_page: F) -> Pagination<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        match fetch_page(page).await {
            Ok(batch) => {
                let full = batch.len() >= per_page;
                items.extend(batch);
                if !full {
                    return Pagination { items, error: None };
                }
                page += 1;
            }
            Err(e) => {
                return Pagination {
                    items,
                    error: Some(e),
                };
            }
        }
    }
}

/// Cached GitHub access shared by the aggregator, scheduler and adapters.
#[derive(Clone)]
pub struct Fetcher {
    api: Arc<dyn GitHubApi>,
    cache: CacheAside,
    ttl: Duration,
}

impl Fetcher {
    pub fn new(api: Arc<dyn GitHubApi>, cache: CacheAside, ttl: Duration) -> Self {
        Self { api, cache, ttl }
    }

    /// A fetcher that skips cache reads and overwrites whatever it fetches.
    pub fn refreshing(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: self.cache.write_only(),
            ttl: self.ttl,
        }
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stars, forks and canonical URL. Errors propagate: without metadata the
    /// repository is left out of the batch.
    pub async fn repo_metadata(&self, repo: &TrackedRepository) -> Result<RepoMetadata> {
        self.cache
            .get_or_compute(&CacheKey::repo_metadata(repo), self.ttl, || {
                self.api.repo_metadata(&repo.owner, &repo.name)
            })
            .await
    }

    /// Branch names in upstream order.
    pub async fn branches(&self, repo: &TrackedRepository) -> Result<Vec<String>> {
        self.cache
            .get_or_compute(&CacheKey::branches(repo), self.ttl, || async {
                let branches = self.api.branches(&repo.owner, &repo.name).await?;
                Ok(branches.into_iter().map(|b| b.name).collect())
            })
            .await
    }

    /// All commits on `branch` (default branch if `None`) inside `window`.
    ///
    /// A page failure returns the commits gathered so far. Partial lists are
    /// not cached.
    pub async fn commits(
        &self,
        repo: &TrackedRepository,
        branch: Option<&str>,
        window: &Window,
    ) -> Vec<CommitRecord> {
        self.commit_history(repo, branch, window).await.items
    }

    /// Like [`Fetcher::commits`], keeping the error that cut the walk short.
    /// Cached lists are always complete.
    pub async fn commit_history(
        &self,
        repo: &TrackedRepository,
        branch: Option<&str>,
        window: &Window,
    ) -> Pagination<CommitRecord> {
        let key = CacheKey::commits(repo, branch, window);
        if let Some(items) = self.cache.lookup(&key).await {
            return Pagination { items, error: None };
        }

        let (since, until) = window.bounds(Utc::now());
        let query = CommitQuery {
            branch: branch.map(str::to_string),
            since,
            until,
        };

        let pages = paginate(PER_PAGE as usize, |page| {
            self.api.commits_page(&repo.owner, &repo.name, &query, page)
        })
        .await;

        let records: Vec<CommitRecord> = pages
            .items
            .into_iter()
            .map(CommitRecord::from)
            .collect();

        match &pages.error {
            None => {
                debug!(
                    "Fetched {} commits for {} on {}",
                    records.len(),
                    repo,
                    branch.unwrap_or("default branch")
                );
                self.cache.store(&key, &records, self.ttl).await;
            }
            Some(e) => warn!(
                "Error fetching commits for {} on {}, keeping {} gathered so far: {}",
                repo,
                branch.unwrap_or("default branch"),
                records.len(),
                e
            ),
        }

        Pagination {
            items: records,
            error: pages.error,
        }
    }

    /// Additions and deletions for one commit, `None` if it cannot be fetched.
    pub async fn commit_stats(&self, repo: &TrackedRepository, sha: &str) -> Option<(u64, u64)> {
        let result = self
            .cache
            .get_or_compute(&CacheKey::commit_detail(repo, sha), self.ttl, || async {
                let commit = self.api.commit(&repo.owner, &repo.name, sha).await?;
                let record = CommitRecord::from(commit);
                Ok((record.additions, record.deletions))
            })
            .await;

        match result {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Error fetching commit {} in {}: {}", sha, repo, e);
                None
            }
        }
    }

    /// Fill in line statistics for `commits`. Failed lookups count as zero.
    pub async fn with_line_stats(
        &self,
        repo: &TrackedRepository,
        commits: Vec<CommitRecord>,
    ) -> Vec<CommitRecord> {
        stream::iter(commits)
            .map(|mut commit| async move {
                if let Some((additions, deletions)) = self.commit_stats(repo, &commit.sha).await {
                    commit.additions = additions;
                    commit.deletions = deletions;
                }
                commit
            })
            .buffered(COMMIT_DETAIL_CONCURRENCY)
            .collect()
            .await
    }

    /// Contributors, or nothing if GitHub cannot be reached.
    pub async fn contributors(&self, repo: &TrackedRepository) -> Vec<Contributor> {
        let result = self
            .cache
            .get_or_compute(&CacheKey::contributors(repo), self.ttl, || {
                self.api.contributors(&repo.owner, &repo.name)
            })
            .await;

        or_empty(result, "contributors", repo)
    }

    /// Open issues, pull requests excluded.
    pub async fn open_issues(&self, repo: &TrackedRepository) -> Vec<Issue> {
        let result = self
            .cache
            .get_or_compute(&CacheKey::issues(repo, ItemState::Open), self.ttl, || async {
                let issues = self
                    .api
                    .issues(&repo.owner, &repo.name, ItemState::Open)
                    .await?;
                Ok(issues
                    .into_iter()
                    .filter(|issue| !issue.is_pull_request())
                    .collect())
            })
            .await;

        or_empty(result, "open issues", repo)
    }

    pub async fn open_pull_requests(&self, repo: &TrackedRepository) -> Vec<PullRequest> {
        self.pull_requests(repo, ItemState::Open).await
    }

    /// Pull requests in `state`, or nothing if GitHub cannot be reached.
    pub async fn pull_requests(
        &self,
        repo: &TrackedRepository,
        state: ItemState,
    ) -> Vec<PullRequest> {
        let result = self
            .cache
            .get_or_compute(&CacheKey::pull_requests(repo, state), self.ttl, || {
                self.api.pull_requests(&repo.owner, &repo.name, state)
            })
            .await;

        or_empty(result, "pull requests", repo)
    }
}

fn or_empty<T>(result: Result<Vec<T>>, what: &str, repo: &TrackedRepository) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!("Error fetching {} for {}: {}", what, repo, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::github::Commit;
    use crate::github::fake::{FakeGitHub, FakeRepo, commit_at};
    use chrono::Duration as TimeDelta;

    fn tracked(owner: &str, name: &str) -> TrackedRepository {
        TrackedRepository {
            owner: owner.to_string(),
            name: name.to_string(),
            source_url: format!("https://github.com/{}/{}", owner, name),
        }
    }

    fn fetcher(fake: Arc<FakeGitHub>) -> Fetcher {
        Fetcher::new(
            fake,
            CacheAside::new(Arc::new(MemoryCache::new())),
            Duration::from_secs(60),
        )
    }

    fn recent_commits(count: usize) -> Vec<Commit> {
        let now = Utc::now();
        (0..count)
            .map(|i| {
                commit_at(
                    &format!("sha{}", i),
                    Some("alice"),
                    now - TimeDelta::minutes(i as i64 + 1),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_paginate_250_records() {
        let source: Vec<u32> = (0..250).collect();
        let mut requested = Vec::new();

        let pages = paginate(100, |page| {
            requested.push(page);
            let start = (page as usize - 1) * 100;
            let batch: Vec<u32> = source.iter().skip(start).take(100).copied().collect();
            async move { Ok(batch) }
        })
        .await;

        assert!(pages.is_complete());
        assert_eq!(pages.items, source);
        assert_eq!(requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_paginate_exact_multiple_stops_on_empty_page() {
        let mut requested = 0;
        let pages = paginate(100, |page| {
            requested += 1;
            let batch: Vec<u32> = if page <= 2 { vec![page; 100] } else { Vec::new() };
            async move { Ok(batch) }
        })
        .await;

        assert_eq!(pages.items.len(), 200);
        assert_eq!(requested, 3);
    }

    #[tokio::test]
    async fn test_paginate_keeps_partial_on_error() {
        let pages = paginate(2, |page| async move {
            match page {
                1 => Ok(vec!["a", "b"]),
                _ => Err(PulseError::UpstreamTimeout),
            }
        })
        .await;

        assert_eq!(pages.items, vec!["a", "b"]);
        assert!(matches!(pages.error, Some(PulseError::UpstreamTimeout)));
    }

    #[tokio::test]
    async fn test_commits_across_pages_in_order() {
        let commits = recent_commits(250);
        let fake = Arc::new(
            FakeGitHub::new().with_repo("acme", "api", FakeRepo::new().branch("main", commits)),
        );
        let fetcher = fetcher(Arc::clone(&fake));

        let records = fetcher
            .commits(&tracked("acme", "api"), Some("main"), &Window::trailing(7))
            .await;

        assert_eq!(records.len(), 250);
        assert_eq!(records[0].sha, "sha0");
        assert_eq!(records[249].sha, "sha249");
        assert_eq!(fake.call_count("commits_page"), 3);
    }

    #[tokio::test]
    async fn test_partial_commits_returned_but_not_cached() {
        let fake = Arc::new(FakeGitHub::new().with_repo(
            "acme",
            "api",
            FakeRepo::new()
                .branch("main", recent_commits(150))
                .failing_commit_page(2),
        ));
        let fetcher = fetcher(Arc::clone(&fake));
        let repo = tracked("acme", "api");

        let first = fetcher.commits(&repo, None, &Window::trailing(7)).await;
        assert_eq!(first.len(), 100);

        let second = fetcher.commits(&repo, None, &Window::trailing(7)).await;
        assert_eq!(second.len(), 100);
        assert_eq!(fake.call_count("commits_page"), 4);
    }

    #[tokio::test]
    async fn test_complete_commits_cached() {
        let fake = Arc::new(
            FakeGitHub::new()
                .with_repo("acme", "api", FakeRepo::new().branch("main", recent_commits(3))),
        );
        let fetcher = fetcher(Arc::clone(&fake));
        let repo = tracked("acme", "api");

        fetcher.commits(&repo, None, &Window::trailing(7)).await;
        fetcher.commits(&repo, None, &Window::trailing(7)).await;
        assert_eq!(fake.call_count("commits_page"), 1);

        // A different window is a different query.
        fetcher.commits(&repo, None, &Window::trailing(30)).await;
        assert_eq!(fake.call_count("commits_page"), 2);
    }

    #[tokio::test]
    async fn test_refreshing_fetcher_bypasses_reads() {
        let fake = Arc::new(
            FakeGitHub::new()
                .with_repo("acme", "api", FakeRepo::new().branch("main", recent_commits(3))),
        );
        let fetcher = fetcher(Arc::clone(&fake));
        let repo = tracked("acme", "api");

        fetcher.repo_metadata(&repo).await.unwrap();
        fetcher.refreshing().repo_metadata(&repo).await.unwrap();
        fetcher.repo_metadata(&repo).await.unwrap();

        assert_eq!(fake.call_count("repo_metadata"), 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_propagates() {
        let fake = Arc::new(FakeGitHub::new().with_repo("acme", "gone", FakeRepo::new().missing()));
        let fetcher = fetcher(fake);

        let result = fetcher.repo_metadata(&tracked("acme", "gone")).await;
        assert!(matches!(result, Err(PulseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_single_page_failures_become_empty() {
        let fake = Arc::new(FakeGitHub::new().with_repo("acme", "gone", FakeRepo::new().missing()));
        let fetcher = fetcher(fake);
        let repo = tracked("acme", "gone");

        assert!(fetcher.contributors(&repo).await.is_empty());
        assert!(fetcher.open_issues(&repo).await.is_empty());
        assert!(fetcher.open_pull_requests(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn test_open_issues_exclude_pull_requests() {
        let fake = Arc::new(FakeGitHub::new().with_repo(
            "acme",
            "api",
            FakeRepo::new().issue(1, false).issue(2, true).issue(3, false),
        ));
        let fetcher = fetcher(fake);

        let issues = fetcher.open_issues(&tracked("acme", "api")).await;
        let numbers: Vec<u64> = issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_line_stats_filled_in_order() {
        let commits = recent_commits(3);
        let fake = Arc::new(FakeGitHub::new().with_repo(
            "acme",
            "api",
            FakeRepo::new()
                .branch("main", commits)
                .commit_stats("sha0", 10, 2)
                .commit_stats("sha2", 1, 1),
        ));
        let fetcher = fetcher(fake);
        let repo = tracked("acme", "api");

        let records = fetcher.commits(&repo, None, &Window::trailing(7)).await;
        let records = fetcher.with_line_stats(&repo, records).await;

        let lines: Vec<u64> = records.iter().map(|c| c.additions + c.deletions).collect();
        assert_eq!(lines, vec![12, 0, 2]);
    }
}
