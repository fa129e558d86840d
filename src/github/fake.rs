// In-memory stand-in for the GitHub API, used by tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{PulseError, Result};

use super::api::{CommitQuery, GitHubApi, PER_PAGE};
use super::types::{
    Branch, Commit, CommitDetails, CommitStats, Contributor, GitSignature, Issue, ItemState,
    PullRequest, RepoMetadata, UserRef,
};

/// Build a commit authored at `at`.
pub fn commit_at(sha: &str, login: Option<&str>, at: DateTime<Utc>) -> Commit {
    Commit {
        sha: sha.to_string(),
        author: login.map(|login| UserRef {
            login: login.to_string(),
        }),
        commit: CommitDetails {
            author: Some(GitSignature {
                name: login.map(str::to_string),
                date: Some(at),
            }),
            committer: None,
        },
        stats: None,
    }
}

/// One fake repository.
#[derive(Default)]
pub struct FakeRepo {
    missing: bool,
    stars: u64,
    forks: u64,
    /// First branch is the default branch.
    branches: Vec<(String, Vec<Commit>)>,
    failing_commit_page: Option<u32>,
    contributors: Vec<String>,
    issues: Vec<Issue>,
    pulls: Vec<PullRequest>,
    stats: HashMap<String, (u64, u64)>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every endpoint answers 404.
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn stars(mut self, stars: u64) -> Self {
        self.stars = stars;
        self
    }

    pub fn forks(mut self, forks: u64) -> Self {
        self.forks = forks;
        self
    }

    pub fn branch(mut self, name: &str, commits: Vec<Commit>) -> Self {
        self.branches.push((name.to_string(), commits));
        self
    }

    pub fn failing_commit_page(mut self, page: u32) -> Self {
        self.failing_commit_page = Some(page);
        self
    }

    pub fn contributor(mut self, login: &str) -> Self {
        self.contributors.push(login.to_string());
        self
    }

    pub fn issue(mut self, number: u64, is_pull_request: bool) -> Self {
        self.issues.push(Issue {
            number,
            title: format!("issue {}", number),
            state: ItemState::Open,
            user: None,
            pull_request: is_pull_request.then(|| serde_json::json!({})),
        });
        self
    }

    pub fn pull(
        mut self,
        number: u64,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.pulls.push(PullRequest {
            number,
            title: format!("pull {}", number),
            state: if closed_at.is_some() {
                ItemState::Closed
            } else {
                ItemState::Open
            },
            user: None,
            created_at,
            closed_at,
        });
        self
    }

    pub fn commit_stats(mut self, sha: &str, additions: u64, deletions: u64) -> Self {
        self.stats.insert(sha.to_string(), (additions, deletions));
        self
    }
}

/// Fake GitHub holding a fixed set of repositories and counting calls.
#[derive(Default)]
pub struct FakeGitHub {
    repos: HashMap<String, FakeRepo>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, owner: &str, name: &str, repo: FakeRepo) -> Self {
        self.repos.insert(repo_id(owner, name), repo);
        self
    }

    /// How many times `method` was called.
    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|c| **c == method).count())
            .unwrap_or(0)
    }

    fn repo(&self, method: &'static str, owner: &str, name: &str) -> Result<&FakeRepo> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(method);
        }

        match self.repos.get(&repo_id(owner, name)) {
            Some(repo) if !repo.missing => Ok(repo),
            _ => Err(PulseError::NotFound(format!("/repos/{}/{}", owner, name))),
        }
    }
}

fn repo_id(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name).to_ascii_lowercase()
}

fn commit_time(commit: &Commit) -> DateTime<Utc> {
    commit
        .commit
        .author
        .as_ref()
        .and_then(|sig| sig.date)
        .unwrap_or_default()
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn repo_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata> {
        let fake = self.repo("repo_metadata", owner, repo)?;
        Ok(RepoMetadata {
            name: repo.to_string(),
            full_name: format!("{}/{}", owner, repo),
            html_url: format!("https://github.com/{}/{}", owner, repo),
            stargazers_count: fake.stars,
            forks_count: fake.forks,
            default_branch: fake.branches.first().map(|(name, _)| name.clone()),
        })
    }

    async fn branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>> {
        let fake = self.repo("branches", owner, repo)?;
        Ok(fake
            .branches
            .iter()
            .map(|(name, _)| Branch { name: name.clone() })
            .collect())
    }

    async fn commits_page(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
        page: u32,
    ) -> Result<Vec<Commit>> {
        let fake = self.repo("commits_page", owner, repo)?;
        if fake.failing_commit_page == Some(page) {
            return Err(PulseError::Upstream {
                status: 502,
                url: format!("/repos/{}/{}/commits?page={}", owner, repo, page),
            });
        }

        let commits = match &query.branch {
            Some(branch) => fake.branches.iter().find(|(name, _)| name == branch),
            None => fake.branches.first(),
        }
        .map(|(_, commits)| commits.as_slice())
        .unwrap_or_default();

        let per_page = PER_PAGE as usize;
        Ok(commits
            .iter()
            .filter(|c| {
                let at = commit_time(c);
                at >= query.since && at < query.until
            })
            .skip((page as usize - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect())
    }

    async fn commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit> {
        let fake = self.repo("commit", owner, repo)?;
        let (additions, deletions) = fake
            .stats
            .get(sha)
            .copied()
            .ok_or_else(|| PulseError::NotFound(sha.to_string()))?;

        let mut commit = commit_at(sha, None, Utc::now());
        commit.stats = Some(CommitStats {
            additions,
            deletions,
            total: additions + deletions,
        });
        Ok(commit)
    }

    async fn contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>> {
        let fake = self.repo("contributors", owner, repo)?;
        Ok(fake
            .contributors
            .iter()
            .map(|login| Contributor {
                login: login.clone(),
                contributions: 1,
            })
            .collect())
    }

    async fn issues(&self, owner: &str, repo: &str, _state: ItemState) -> Result<Vec<Issue>> {
        let fake = self.repo("issues", owner, repo)?;
        Ok(fake.issues.clone())
    }

    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: ItemState,
    ) -> Result<Vec<PullRequest>> {
        let fake = self.repo("pull_requests", owner, repo)?;
        Ok(fake
            .pulls
            .iter()
            .filter(|pr| match state {
                ItemState::Open => pr.closed_at.is_none(),
                ItemState::Closed => pr.closed_at.is_some(),
                ItemState::All | ItemState::Unknown => true,
            })
            .cloned()
            .collect())
    }
}
