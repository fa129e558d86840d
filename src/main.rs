use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use repopulse::commands::{self, PREFIX};
use repopulse::cache::DiskCache;
use repopulse::config::{CacheBackend, Config};
use repopulse::notify::{LogNotifier, Notifier, WebhookNotifier};
use repopulse::{Context, PulseError, Result, scheduler, server};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(env::args().skip(1).collect()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Vec<String>) -> Result<()> {
    let config = Config::load()?;

    if args.first().map(String::as_str) == Some("clear-cache") {
        return clear_cache(&config.cache).await;
    }

    let ctx = Arc::new(Context::from_config(config)?);
    info!("Tracking {} repositories", ctx.repos.len());

    match args.first().map(String::as_str) {
        None | Some("serve") => {
            let notifier: Arc<dyn Notifier> = match &ctx.config.notify_webhook_url {
                Some(url) => Arc::new(WebhookNotifier::new(
                    url.clone(),
                    ctx.config.request_timeout,
                )?),
                None => Arc::new(LogNotifier),
            };

            let jobs = scheduler::spawn(Arc::clone(&ctx), notifier);
            let result = server::serve(ctx).await;
            for job in jobs {
                job.abort();
            }
            result
        }
        Some("command") => {
            let mut text = args[1..].join(" ");
            if !text.starts_with(PREFIX) {
                text = format!("{} {}", PREFIX, text);
            }

            let reply = commands::dispatch(&ctx, &text)
                .await
                .ok_or_else(|| PulseError::InvalidRequest(format!("not a command: {}", text)))?;
            println!("{}", reply);
            Ok(())
        }
        Some(other) => Err(PulseError::Configuration(format!(
            "unknown mode {:?}, usage: repopulse [serve | command <text> | clear-cache]",
            other
        ))),
    }
}

async fn clear_cache(backend: &CacheBackend) -> Result<()> {
    match backend {
        CacheBackend::Disk(dir) => {
            DiskCache::new(dir.clone()).clear().await?;
            info!("Cleared disk cache at {}", dir.display());
        }
        _ => info!("No disk cache configured, nothing to clear"),
    }
    Ok(())
}
