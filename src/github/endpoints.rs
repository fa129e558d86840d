// GitHub API endpoint functions.
// Implements the upstream seam over the REST endpoints the fetcher uses.

use async_trait::async_trait;

use crate::error::Result;

use super::api::{CommitQuery, GitHubApi, PER_PAGE};
use super::client::GitHubClient;
use super::types::{Branch, Commit, Contributor, Issue, ItemState, PullRequest, RepoMetadata};

/// Query parameters for one commits page.
fn commit_params(query: &CommitQuery, page: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("since", query.since.to_rfc3339()),
        ("until", query.until.to_rfc3339()),
        ("per_page", PER_PAGE.to_string()),
        ("page", page.to_string()),
    ];
    if let Some(branch) = &query.branch {
        params.push(("sha", branch.clone()));
    }
    params
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn repo_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata> {
        let response = self.get(&format!("/repos/{}/{}", owner, repo)).await?;
        let metadata: RepoMetadata = response.json().await?;
        Ok(metadata)
    }

    async fn branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>> {
        let params = [("per_page", PER_PAGE.to_string())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/branches", owner, repo), &params)
            .await?;
        let branches: Vec<Branch> = response.json().await?;
        Ok(branches)
    }

    async fn commits_page(
        &self,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
        page: u32,
    ) -> Result<Vec<Commit>> {
        let response = self
            .get_with_params(
                &format!("/repos/{}/{}/commits", owner, repo),
                &commit_params(query, page),
            )
            .await?;
        let commits: Vec<Commit> = response.json().await?;
        Ok(commits)
    }

    async fn commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit> {
        let response = self
            .get(&format!("/repos/{}/{}/commits/{}", owner, repo, sha))
            .await?;
        let commit: Commit = response.json().await?;
        Ok(commit)
    }

    async fn contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>> {
        let response = self
            .get(&format!("/repos/{}/{}/contributors", owner, repo))
            .await?;
        // 204 No Content for empty repositories.
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let contributors: Vec<Contributor> = serde_json::from_str(&body)?;
        Ok(contributors)
    }

    async fn issues(&self, owner: &str, repo: &str, state: ItemState) -> Result<Vec<Issue>> {
        let params = [("state", state.as_param())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/issues", owner, repo), &params)
            .await?;
        let issues: Vec<Issue> = response.json().await?;
        Ok(issues)
    }

    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: ItemState,
    ) -> Result<Vec<PullRequest>> {
        let params = [("state", state.as_param())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/pulls", owner, repo), &params)
            .await?;
        let pulls: Vec<PullRequest> = response.json().await?;
        Ok(pulls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_commit_params() {
        let query = CommitQuery {
            branch: Some("main".to_string()),
            since: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            until: Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        };

        let params = commit_params(&query, 3);
        assert!(params.contains(&("per_page", "100".to_string())));
        assert!(params.contains(&("page", "3".to_string())));
        assert!(params.contains(&("sha", "main".to_string())));
        assert!(params.contains(&("since", "2024-01-01T00:00:00+00:00".to_string())));
    }

    #[test]
    fn test_commit_params_default_branch() {
        let query = CommitQuery {
            branch: None,
            since: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            until: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        };

        let params = commit_params(&query, 1);
        assert!(params.iter().all(|(name, _)| *name != "sha"));
    }
}
