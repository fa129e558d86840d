// GitHub API module.
// Provides the HTTP client, the upstream seam, response types and the cached fetcher.

pub mod api;
pub mod client;
pub mod endpoints;
pub mod fetcher;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{CommitQuery, GitHubApi, PER_PAGE};
pub use client::GitHubClient;
pub use fetcher::{Fetcher, Pagination, paginate};
pub use types::*;
