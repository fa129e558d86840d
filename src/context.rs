// Application context.
// Built once at startup and handed to the scheduler, HTTP handlers and command dispatcher.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::aggregate::Aggregator;
use crate::cache::{CacheAside, DiskCache, MemoryCache, RedisCache};
use crate::config::{CacheBackend, Config};
use crate::error::{PulseError, Result};
use crate::github::{Fetcher, GitHubApi, GitHubClient};
use crate::model::TrackedRepository;
use crate::repos::load_repositories;

pub struct Context {
    pub config: Config,
    pub repos: Vec<TrackedRepository>,
    pub aggregator: Aggregator,
}

impl Context {
    pub fn new(
        config: Config,
        repos: Vec<TrackedRepository>,
        api: Arc<dyn GitHubApi>,
        cache: CacheAside,
    ) -> Self {
        let fetcher = Fetcher::new(api, cache, config.cache_ttl);
        Self {
            config,
            repos,
            aggregator: Aggregator::new(fetcher),
        }
    }

    /// Load the tracked list and wire up the GitHub client and cache backend.
    pub fn from_config(config: Config) -> Result<Self> {
        let repos = load_repositories(&config.repos_file)?;
        let client = github_client(&config)?;
        let cache = build_cache(&config.cache)?;
        Ok(Self::new(config, repos, Arc::new(client), cache))
    }

    /// Look up a tracked repository, ignoring case.
    pub fn find_repo(&self, owner: &str, name: &str) -> Option<&TrackedRepository> {
        self.repos.iter().find(|repo| repo.matches(owner, name))
    }

    /// Run `fut` under the request-level timeout.
    pub async fn with_timeout<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.request_timeout, fut)
            .await
            .map_err(|_| PulseError::UpstreamTimeout)?
    }
}

/// Authenticated client, pointed at `REPOPULSE_GITHUB_API_URL` when set.
pub fn github_client(config: &Config) -> Result<GitHubClient> {
    let client = GitHubClient::new(&config.github_token, config.request_timeout)?;
    match &config.github_api_url {
        Some(url) => {
            info!("Using GitHub API at {}", url);
            Ok(client.with_base_url(url.as_str()))
        }
        None => Ok(client),
    }
}

/// Fails only on an unparsable Redis URL. An unreachable server is not an
/// error here; reads and writes against it fall back to GitHub.
pub fn build_cache(backend: &CacheBackend) -> Result<CacheAside> {
    let cache = match backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache");
            CacheAside::new(Arc::new(MemoryCache::new()))
        }
        CacheBackend::Disk(dir) => {
            info!("Using disk cache at {}", dir.display());
            CacheAside::new(Arc::new(DiskCache::new(dir.clone())))
        }
        CacheBackend::Redis(url) => {
            info!("Using Redis cache");
            CacheAside::new(Arc::new(RedisCache::new(url)?))
        }
        CacheBackend::Disabled => {
            info!("Caching disabled");
            CacheAside::disabled()
        }
    };
    Ok(cache)
}
