// GitHub API response types.
// Defines structs for deserializing the repository, commit, issue and pull request endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CommitRecord;

/// GitHub user reference, as embedded in commits, issues and contributor lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub login: String,
}

/// Repository metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub default_branch: Option<String>,
}

/// Branch listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Commit as returned by the commits endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Linked GitHub account; absent when the commit email is not mapped.
    pub author: Option<UserRef>,
    pub commit: CommitDetails,
    /// Only present on the single-commit endpoint.
    pub stats: Option<CommitStats>,
}

/// Git-level commit information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetails {
    pub author: Option<GitSignature>,
    pub committer: Option<GitSignature>,
}

/// Git author or committer signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Line statistics for a single commit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

impl From<Commit> for CommitRecord {
    fn from(commit: Commit) -> Self {
        let timestamp = commit
            .commit
            .author
            .as_ref()
            .and_then(|sig| sig.date)
            .or_else(|| commit.commit.committer.as_ref().and_then(|sig| sig.date))
            .unwrap_or_default();
        let stats = commit.stats.unwrap_or_default();

        CommitRecord {
            sha: commit.sha,
            author_login: commit.author.map(|user| user.login),
            additions: stats.additions,
            deletions: stats.deletions,
            timestamp,
        }
    }
}

/// Repository contributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    #[serde(default)]
    pub contributions: u64,
}

/// Issue or pull request state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Open,
    Closed,
    All,
    #[serde(other)]
    Unknown,
}

impl ItemState {
    pub fn as_param(&self) -> &'static str {
        match self {
            ItemState::Open => "open",
            ItemState::Closed => "closed",
            ItemState::All | ItemState::Unknown => "all",
        }
    }
}

/// Issue from the issues endpoint. Pull requests also appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    pub user: Option<UserRef>,
    /// Present when the issue is actually a pull request.
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Pull request from the pulls endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    pub user: Option<UserRef>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_into_record() {
        let json = r#"{
            "sha": "abc123",
            "author": {"login": "octocat"},
            "commit": {
                "author": {"name": "The Octocat", "date": "2024-03-01T12:00:00Z"},
                "committer": {"name": "GitHub", "date": "2024-03-02T12:00:00Z"}
            }
        }"#;

        let commit: Commit = serde_json::from_str(json).unwrap();
        let record = CommitRecord::from(commit);

        assert_eq!(record.sha, "abc123");
        assert_eq!(record.author_login.as_deref(), Some("octocat"));
        assert_eq!(record.additions, 0);
        assert_eq!(record.timestamp.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_commit_without_account() {
        let json = r#"{
            "sha": "def456",
            "author": null,
            "commit": {"author": null, "committer": {"date": "2024-03-02T12:00:00Z"}},
            "stats": {"additions": 10, "deletions": 4, "total": 14}
        }"#;

        let commit: Commit = serde_json::from_str(json).unwrap();
        let record = CommitRecord::from(commit);

        assert_eq!(record.author_login, None);
        assert_eq!(record.author_label(), "Unknown");
        assert_eq!(record.additions + record.deletions, 14);
        assert_eq!(record.timestamp.to_rfc3339(), "2024-03-02T12:00:00+00:00");
    }

    #[test]
    fn test_issue_pull_request_marker() {
        let json = r#"[
            {"number": 1, "title": "bug", "state": "open", "user": {"login": "a"}},
            {"number": 2, "title": "fix", "state": "open", "user": null,
             "pull_request": {"url": "https://api.github.com/repos/a/b/pulls/2"}}
        ]"#;

        let issues: Vec<Issue> = serde_json::from_str(json).unwrap();
        assert!(!issues[0].is_pull_request());
        assert!(issues[1].is_pull_request());
    }

    #[test]
    fn test_unknown_state() {
        let state: ItemState = serde_json::from_str("\"merged\"").unwrap();
        assert_eq!(state, ItemState::Unknown);
    }
}
