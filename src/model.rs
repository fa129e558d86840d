// Domain types shared by the fetcher, aggregator and adapters.
// Wire names follow what the dashboard reads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub repository configured for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedRepository {
    pub owner: String,
    pub name: String,
    pub source_url: String,
}

impl TrackedRepository {
    /// Case-insensitive match on owner and name, as GitHub treats them.
    pub fn matches(&self, owner: &str, name: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for TrackedRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Time range scoping commit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The last `days` days, ending at the moment of the query.
    Trailing { days: u32 },
    /// Explicit `[since, until)` range.
    Range {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

impl Window {
    pub fn trailing(days: u32) -> Self {
        Window::Trailing { days }
    }

    pub fn range(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Window::Range { since, until }
    }

    /// Resolve the window to concrete bounds relative to `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            Window::Trailing { days } => (now - Duration::days(i64::from(days)), now),
            Window::Range { since, until } => (since, until),
        }
    }

    /// Stable textual form used inside cache keys.
    pub fn key_part(&self) -> String {
        match self {
            Window::Trailing { days } => format!("last-{}d", days),
            Window::Range { since, until } => {
                format!("{}:{}", since.to_rfc3339(), until.to_rfc3339())
            }
        }
    }
}

/// One commit as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub sha: String,
    pub author_login: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    /// Author label used in per-author groupings.
    pub fn author_label(&self) -> &str {
        self.author_login.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }
}

/// Label for commits without a linked GitHub account.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Commits on one branch, grouped by author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchContribution {
    #[serde(rename = "branch")]
    pub branch_name: String,
    pub total_commits: u64,
    pub contributions_by_author: BTreeMap<String, u64>,
}

impl BranchContribution {
    pub fn from_commits(branch_name: impl Into<String>, commits: &[CommitRecord]) -> Self {
        let mut contributions_by_author = BTreeMap::new();
        for commit in commits {
            *contributions_by_author
                .entry(commit.author_label().to_string())
                .or_insert(0) += 1;
        }

        Self {
            branch_name: branch_name.into(),
            total_commits: commits.len() as u64,
            contributions_by_author,
        }
    }
}

/// Activity of one tracked repository over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    pub name: String,
    pub owner: String,
    pub stars: u64,
    pub forks: u64,
    pub url: String,
    pub branches: Vec<BranchContribution>,
    #[serde(rename = "commits")]
    pub total_commits: u64,
}

/// Timing information attached to a progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Seconds spent computing the report.
    pub total_time: f64,
    pub last_updated: DateTime<Utc>,
}

/// Envelope served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub metadata: ReportMetadata,
    pub repositories: Vec<RepositorySummary>,
}

/// Figures reported by the `repo-stats` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStats {
    pub commit_count: u64,
    pub contributor_count: u64,
    pub total_lines: u64,
    pub open_issues_count: u64,
    pub open_pull_request_count: u64,
    /// Mean time from opening to closing, over closed pull requests.
    pub average_resolution_time: std::time::Duration,
}

/// Result of the most-active-contributor query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopContributor {
    Member { login: String, commit_count: u64 },
    NoContributions,
}
