// Tracked repository list loader.
// Reads `{"urls": [...]}` and turns GitHub URLs into owner/name pairs.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{PulseError, Result};
use crate::model::TrackedRepository;

#[derive(Debug, Deserialize)]
struct RepoList {
    urls: Vec<String>,
}

/// Load and parse the tracked repository list from a JSON file.
pub fn load_repositories(path: &Path) -> Result<Vec<TrackedRepository>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        PulseError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;

    let repos = parse_repositories(&contents)?;
    info!(
        "Loaded {} tracked repositories from {}",
        repos.len(),
        path.display()
    );
    Ok(repos)
}

/// Parse the JSON list, skipping malformed URLs and dropping duplicates.
pub fn parse_repositories(json: &str) -> Result<Vec<TrackedRepository>> {
    let list: RepoList = serde_json::from_str(json)
        .map_err(|e| PulseError::Configuration(format!("malformed repository list: {}", e)))?;

    from_urls(&list.urls)
}

/// Build the tracked set from raw URLs. First occurrence of a duplicate wins.
pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Vec<TrackedRepository>> {
    let mut seen = HashSet::new();
    let mut repos = Vec::new();

    for url in urls {
        let url = url.as_ref();
        let Some((owner, name)) = parse_repo_url(url) else {
            warn!("Skipping invalid repository URL: {}", url);
            continue;
        };

        let identity = (owner.to_ascii_lowercase(), name.to_ascii_lowercase());
        if !seen.insert(identity) {
            continue;
        }

        repos.push(TrackedRepository {
            owner,
            name,
            source_url: url.to_string(),
        });
    }

    if repos.is_empty() {
        return Err(PulseError::Configuration(
            "no valid repositories found".to_string(),
        ));
    }

    Ok(repos)
}

/// Extract `(owner, name)` from a GitHub repository URL.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let (_, path) = url.trim().split_once("github.com/")?;
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let owner = segments.next()?;
    let name = segments.next()?;
    let name = name.strip_suffix(".git").unwrap_or(name);

    if !is_valid_segment(owner) || !is_valid_segment(name) {
        return None;
    }

    Some((owner.to_string(), name.to_string()))
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
