// Chat commands.
// Parses `!github <command> [args]` messages and renders markdown replies.

use tracing::{error, info};

use crate::aggregate::{RankMetric, rank_by_activity};
use crate::context::Context;
use crate::error::Result;
use crate::model::{RepoStats, TopContributor, TrackedRepository, Window};

pub const PREFIX: &str = "!github";

const TOP_REPOS_LIMIT: usize = 5;

const UNKNOWN_COMMAND: &str = "Unknown command. Available commands: inactive-users, inactive-repos, top-repos, top-contributor, repo-stats";
const REPO_STATS_USAGE: &str =
    "Please provide owner and repo names. Usage: !github repo-stats <owner> <repo>";
const NOT_MONITORED: &str = "This repository is not in the list of monitored repositories.";
const GENERIC_ERROR: &str =
    "An error occurred while processing your command. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InactiveUsers,
    InactiveRepos,
    TopRepos,
    TopContributor,
    /// `None` when owner or repo is missing.
    RepoStats(Option<(String, String)>),
    Unknown(String),
}

impl Command {
    /// Parse a chat message. `None` if it is not addressed to the bot.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        if words.next()? != PREFIX {
            return None;
        }

        let command = match words.next().unwrap_or_default() {
            "inactive-users" => Command::InactiveUsers,
            "inactive-repos" => Command::InactiveRepos,
            "top-repos" => Command::TopRepos,
            "top-contributor" => Command::TopContributor,
            "repo-stats" => match (words.next(), words.next()) {
                (Some(owner), Some(name)) => {
                    Command::RepoStats(Some((owner.to_string(), name.to_string())))
                }
                _ => Command::RepoStats(None),
            },
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// Answer a chat message. `None` if the message is not a command.
/// Any failure, including the request timeout, becomes a generic error reply.
pub async fn dispatch(ctx: &Context, text: &str) -> Option<String> {
    let command = Command::parse(text)?;
    info!("Processing command: {:?}", command);

    let reply = match ctx.with_timeout(execute(ctx, &command)).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Error processing command {:?}: {}", command, e);
            GENERIC_ERROR.to_string()
        }
    };
    Some(reply)
}

async fn execute(ctx: &Context, command: &Command) -> Result<String> {
    let days = ctx.config.activity_window_days;
    let aggregator = &ctx.aggregator;

    let reply = match command {
        Command::InactiveUsers => {
            format_inactive_users(&aggregator.inactive_members(&ctx.repos, days).await)
        }
        Command::InactiveRepos => {
            format_inactive_repos(&aggregator.find_inactive(&ctx.repos, days).await)
        }
        Command::TopRepos => {
            let summaries = aggregator
                .summarize_all(&ctx.repos, &Window::trailing(days))
                .await;
            let ranked = rank_by_activity(&summaries, RankMetric::Commits);
            let lines: Vec<String> = ranked
                .iter()
                .take(TOP_REPOS_LIMIT)
                .enumerate()
                .map(|(i, summary)| {
                    format!(
                        "{}. [{}/{}]({}): {} commits",
                        i + 1,
                        summary.owner,
                        summary.name,
                        summary.url,
                        summary.total_commits
                    )
                })
                .collect();
            format!(
                "**Top {} most active repos in the last week:**\n{}",
                TOP_REPOS_LIMIT,
                lines.join("\n")
            )
        }
        Command::TopContributor => {
            format_top_contributor(&aggregator.most_active_contributor(&ctx.repos, days).await)
        }
        Command::RepoStats(None) => REPO_STATS_USAGE.to_string(),
        Command::RepoStats(Some((owner, name))) => match ctx.find_repo(owner, name) {
            Some(repo) => format_repo_stats(owner, name, &aggregator.repo_stats(repo, days).await),
            None => NOT_MONITORED.to_string(),
        },
        Command::Unknown(_) => UNKNOWN_COMMAND.to_string(),
    };
    Ok(reply)
}

fn format_inactive_users(inactive: &[String]) -> String {
    if inactive.is_empty() {
        return "**All members have been active in the last week.**".to_string();
    }
    let lines: Vec<String> = inactive.iter().map(|user| format!("• {}", user)).collect();
    format!("**Inactive members in the last week:**\n{}", lines.join("\n"))
}

fn format_inactive_repos(inactive: &[TrackedRepository]) -> String {
    if inactive.is_empty() {
        return "**All repositories have had activity in the last week.**".to_string();
    }
    let lines: Vec<String> = inactive
        .iter()
        .map(|repo| format!("• [{}]({})", repo, repo.source_url))
        .collect();
    format!(
        "**Repositories with no commits in the last week:**\n{}",
        lines.join("\n")
    )
}

fn format_top_contributor(top: &TopContributor) -> String {
    let (name, count) = match top {
        TopContributor::Member {
            login,
            commit_count,
        } => (login.as_str(), *commit_count),
        TopContributor::NoContributions => ("No one", 0),
    };
    format!(
        "**Most active member in the last week:**\n{} with {} commits",
        name, count
    )
}

fn format_repo_stats(owner: &str, name: &str, stats: &RepoStats) -> String {
    format!(
        "**Stats for {}/{}:**\n\
         Commits: {}\n\
         Contributors: {}\n\
         Total lines changed: {}\n\
         Open issues: {}\n\
         Pull requests: {}\n\
         Average PR resolution time: {:.1} hours\n",
        owner,
        name,
        stats.commit_count,
        stats.contributor_count,
        stats.total_lines,
        stats.open_issues_count,
        stats.open_pull_request_count,
        stats.average_resolution_time.as_secs_f64() / 3600.0
    )
}
