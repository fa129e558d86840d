// Activity aggregation.
// Turns fetched commits into per-repository summaries, rankings and inactivity reports.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::CacheKey;
use crate::error::{PulseError, Result};
use crate::github::{Fetcher, ItemState, PullRequest};
use crate::model::{
    BranchContribution, CommitRecord, ProgressReport, RepoStats, ReportMetadata,
    RepositorySummary, TopContributor, TrackedRepository, Window,
};

/// Metric used to order repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    Commits,
    Stars,
    Forks,
}

impl RankMetric {
    fn value(&self, summary: &RepositorySummary) -> u64 {
        match self {
            RankMetric::Commits => summary.total_commits,
            RankMetric::Stars => summary.stars,
            RankMetric::Forks => summary.forks,
        }
    }
}

/// Order summaries by `metric`, highest first. Equal values keep their input order.
pub fn rank_by_activity(
    summaries: &[RepositorySummary],
    metric: RankMetric,
) -> Vec<&RepositorySummary> {
    let mut ranked: Vec<&RepositorySummary> = summaries.iter().collect();
    // sort_by_key is stable
    ranked.sort_by_key(|summary| Reverse(metric.value(summary)));
    ranked
}

/// Author with the most commits across `commit_lists`, visited in order.
/// Ties go to whoever appeared first. Commits without a login are ignored.
pub fn top_contributor<'a, I>(commit_lists: I) -> TopContributor
where
    I: IntoIterator<Item = &'a [CommitRecord]>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u64> = HashMap::new();

    for commits in commit_lists {
        for login in commits.iter().filter_map(|c| c.author_login.as_deref()) {
            let count = counts.entry(login).or_insert_with(|| {
                order.push(login);
                0
            });
            *count += 1;
        }
    }

    let mut best: Option<(&str, u64)> = None;
    for login in order {
        let count = counts[login];
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((login, count));
        }
    }

    match best {
        Some((login, commit_count)) => TopContributor::Member {
            login: login.to_string(),
            commit_count,
        },
        None => TopContributor::NoContributions,
    }
}

/// Mean open-to-close time over closed pull requests. Zero if none closed.
pub fn average_resolution_time(pulls: &[PullRequest]) -> Duration {
    let resolved: Vec<Duration> = pulls
        .iter()
        .filter_map(|pr| {
            let closed_at = pr.closed_at?;
            (closed_at - pr.created_at).to_std().ok()
        })
        .collect();

    if resolved.is_empty() {
        return Duration::ZERO;
    }

    resolved.iter().sum::<Duration>() / resolved.len() as u32
}

/// Wrap summaries in the dashboard envelope. `NoData` when there are none.
fn build_report(repositories: Vec<RepositorySummary>, started: Instant) -> Result<ProgressReport> {
    if repositories.is_empty() {
        return Err(PulseError::NoData);
    }

    let total_time = started.elapsed().as_secs_f64();
    info!(
        "Built report for {} repositories in {:.2}s",
        repositories.len(),
        total_time
    );
    Ok(ProgressReport {
        metadata: ReportMetadata {
            total_time,
            last_updated: Utc::now(),
        },
        repositories,
    })
}

/// Combines fetcher calls into the views consumers ask for.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Fetcher,
}

impl Aggregator {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// An aggregator whose cache lookups all miss, so every result is rewritten.
    pub fn refreshing(&self) -> Self {
        Self::new(self.fetcher.refreshing())
    }

    /// Summarize one repository. `None` if its metadata or branches cannot be fetched.
    pub async fn summarize_repository(
        &self,
        repo: &TrackedRepository,
        window: &Window,
    ) -> Option<RepositorySummary> {
        let mut summaries = self
            .summarize_windows(repo, std::slice::from_ref(window))
            .await?;
        summaries.pop().map(|(summary, _)| summary)
    }

    /// One summary per window, each paired with whether every commit page came back.
    /// Metadata and branches are fetched once for all windows.
    async fn summarize_windows(
        &self,
        repo: &TrackedRepository,
        windows: &[Window],
    ) -> Option<Vec<(RepositorySummary, bool)>> {
        let (metadata, branches) = tokio::join!(
            self.fetcher.repo_metadata(repo),
            self.fetcher.branches(repo)
        );

        let (metadata, branches) = match (metadata, branches) {
            (Ok(metadata), Ok(branches)) => (metadata, branches),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Error fetching data for {}: {}", repo, e);
                return None;
            }
        };

        let metadata = &metadata;
        let branches = &branches;
        let summaries = join_all(windows.iter().map(|window| async move {
            let histories = join_all(branches.iter().map(|branch| async move {
                let history = self
                    .fetcher
                    .commit_history(repo, Some(branch.as_str()), window)
                    .await;
                (
                    BranchContribution::from_commits(branch.as_str(), &history.items),
                    history.is_complete(),
                )
            }))
            .await;

            let complete = histories.iter().all(|(_, complete)| *complete);
            let contributions: Vec<BranchContribution> =
                histories.into_iter().map(|(branch, _)| branch).collect();
            let total_commits = contributions.iter().map(|b| b.total_commits).sum();
            info!(
                "Completed processing for {} over {}. Total commits: {}",
                repo,
                window.key_part(),
                total_commits
            );

            let summary = RepositorySummary {
                name: metadata.name.clone(),
                owner: repo.owner.clone(),
                stars: metadata.stargazers_count,
                forks: metadata.forks_count,
                url: metadata.html_url.clone(),
                branches: contributions,
                total_commits,
            };
            (summary, complete)
        }))
        .await;

        Some(summaries)
    }

    /// Summaries paired with the repository they describe, in input order.
    async fn summarize_each<'a>(
        &self,
        repos: &'a [TrackedRepository],
        window: &Window,
    ) -> Vec<(&'a TrackedRepository, Option<(RepositorySummary, bool)>)> {
        join_all(repos.iter().map(|repo| async move {
            let summary = self
                .summarize_windows(repo, std::slice::from_ref(window))
                .await
                .and_then(|mut summaries| summaries.pop());
            (repo, summary)
        }))
        .await
    }

    /// Summaries for every repository that could be fetched, in input order.
    pub async fn summarize_all(
        &self,
        repos: &[TrackedRepository],
        window: &Window,
    ) -> Vec<RepositorySummary> {
        self.summarize_each(repos, window)
            .await
            .into_iter()
            .filter_map(|(_, summary)| summary.map(|(summary, _)| summary))
            .collect()
    }

    /// Like [`Aggregator::summarize_all`] for several windows at once, one list per window.
    /// Each repository's metadata and branches are fetched once.
    pub async fn summarize_all_windows(
        &self,
        repos: &[TrackedRepository],
        windows: &[Window],
    ) -> Vec<Vec<RepositorySummary>> {
        let per_repo = join_all(
            repos
                .iter()
                .map(|repo| self.summarize_windows(repo, windows)),
        )
        .await;

        let mut per_window: Vec<Vec<RepositorySummary>> = vec![Vec::new(); windows.len()];
        for summaries in per_repo.into_iter().flatten() {
            for (i, (summary, _)) in summaries.into_iter().enumerate() {
                per_window[i].push(summary);
            }
        }
        per_window
    }

    /// Dashboard envelope for `window`, cached. Fails with `NoData` when nothing
    /// could be summarized; that outcome is not cached.
    pub async fn progress_report(
        &self,
        repos: &[TrackedRepository],
        window: &Window,
    ) -> Result<ProgressReport> {
        let key = CacheKey::repo_progress(window);
        self.fetcher
            .cache()
            .get_or_compute(&key, self.fetcher.ttl(), || async {
                let started = Instant::now();
                let repositories = self.summarize_all(repos, window).await;
                build_report(repositories, started)
            })
            .await
    }

    /// Cache `repositories` as the dashboard report for `window`.
    pub async fn store_report(
        &self,
        window: &Window,
        repositories: Vec<RepositorySummary>,
        started: Instant,
    ) -> Result<ProgressReport> {
        let report = build_report(repositories, started)?;
        self.fetcher
            .cache()
            .store(&CacheKey::repo_progress(window), &report, self.fetcher.ttl())
            .await;
        Ok(report)
    }

    /// Repositories with no commit on any branch in the last `window_days` days.
    /// Repositories that could not be fetched, or whose commit history came back
    /// incomplete, are not reported.
    pub async fn find_inactive(
        &self,
        repos: &[TrackedRepository],
        window_days: u32,
    ) -> Vec<TrackedRepository> {
        self.summarize_each(repos, &Window::trailing(window_days))
            .await
            .into_iter()
            .filter_map(|(repo, summary)| match summary {
                Some((summary, true)) if summary.total_commits == 0 => Some(repo.clone()),
                Some((summary, false)) if summary.total_commits == 0 => {
                    warn!("Commit history of {} incomplete, not reporting it inactive", repo);
                    None
                }
                Some(_) => None,
                None => {
                    warn!("Activity of {} unknown, not reporting it inactive", repo);
                    None
                }
            })
            .collect()
    }

    /// Default-branch commits in the trailing window for each repository, in input order.
    async fn recent_commits(
        &self,
        repos: &[TrackedRepository],
        window_days: u32,
    ) -> Vec<Vec<CommitRecord>> {
        let window = Window::trailing(window_days);
        join_all(
            repos
                .iter()
                .map(|repo| self.fetcher.commits(repo, None, &window)),
        )
        .await
    }

    /// The member with the most default-branch commits across all repositories.
    pub async fn most_active_contributor(
        &self,
        repos: &[TrackedRepository],
        window_days: u32,
    ) -> TopContributor {
        let commits = self.recent_commits(repos, window_days).await;
        top_contributor(commits.iter().map(Vec::as_slice))
    }

    /// Contributors with no default-branch commit in the window, first-seen order, no duplicates.
    pub async fn inactive_members(
        &self,
        repos: &[TrackedRepository],
        window_days: u32,
    ) -> Vec<String> {
        let window = Window::trailing(window_days);
        let per_repo = join_all(repos.iter().map(|repo| {
            let window = &window;
            async move {
                let (commits, contributors) = tokio::join!(
                    self.fetcher.commits(repo, None, window),
                    self.fetcher.contributors(repo)
                );
                let active: HashSet<String> =
                    commits.into_iter().filter_map(|c| c.author_login).collect();
                contributors
                    .into_iter()
                    .map(|c| c.login)
                    .filter(|login| !active.contains(login))
                    .collect::<Vec<_>>()
            }
        }))
        .await;

        let mut seen = HashSet::new();
        per_repo
            .into_iter()
            .flatten()
            .filter(|login| seen.insert(login.clone()))
            .collect()
    }

    /// Figures for the `repo-stats` command.
    pub async fn repo_stats(&self, repo: &TrackedRepository, window_days: u32) -> RepoStats {
        let window = Window::trailing(window_days);
        let (commits, open_issues, open_pulls, all_pulls) = tokio::join!(
            self.fetcher.commits(repo, None, &window),
            self.fetcher.open_issues(repo),
            self.fetcher.open_pull_requests(repo),
            self.fetcher.pull_requests(repo, ItemState::All)
        );

        let commits = self.fetcher.with_line_stats(repo, commits).await;
        let contributors: HashSet<&str> = commits
            .iter()
            .filter_map(|c| c.author_login.as_deref())
            .collect();

        RepoStats {
            commit_count: commits.len() as u64,
            contributor_count: contributors.len() as u64,
            total_lines: commits.iter().map(|c| c.additions + c.deletions).sum(),
            open_issues_count: open_issues.len() as u64,
            open_pull_request_count: open_pulls.len() as u64,
            average_resolution_time: average_resolution_time(&all_pulls),
        }
    }
}
