// Background jobs.
// Periodic cache refresh gated by peak hours, and the end-of-day inactive-members notice.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::model::Window;
use crate::notify::{Notifier, format_inactive_notice};

const NOTICE_HOUR: u32 = 23;
const NOTICE_MINUTE: u32 = 59;

/// Decides whether a scheduled tick should refresh.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub offset: FixedOffset,
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
}

impl RefreshPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            offset: config.utc_offset,
            peak_start_hour: config.peak_start_hour,
            peak_end_hour: config.peak_end_hour,
        }
    }

    /// Whether `hour` (local) falls in `[start, end)`. The window may wrap midnight;
    /// equal bounds cover the whole day.
    pub fn is_peak_hour(&self, hour: u32) -> bool {
        let (start, end) = (self.peak_start_hour, self.peak_end_hour);
        if start == end {
            true
        } else if start < end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }

    /// Weekends always refresh; weekdays only during peak hours.
    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        match local.weekday() {
            Weekday::Sat | Weekday::Sun => true,
            _ => self.is_peak_hour(local.hour()),
        }
    }
}

/// The first `hour:minute` local time strictly after `now`.
pub fn next_daily_run(
    now: DateTime<Utc>,
    offset: FixedOffset,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let local = now.with_timezone(&offset);
    let today = local
        .date_naive()
        .and_hms_opt(hour, minute, 0)?
        .and_local_timezone(offset)
        .single()?;

    let next = if today > local {
        today
    } else {
        today + Duration::days(1)
    };
    Some(next.with_timezone(&Utc))
}

/// Rewrite the cached dashboard report and the activity-window data the commands read.
/// Failures are logged; a repository that cannot be fetched does not stop the others.
pub async fn refresh_once(ctx: &Context) {
    let started = Instant::now();
    let aggregator = ctx.aggregator.refreshing();
    let report_window = Window::trailing(ctx.config.report_window_days);
    let activity_days = ctx.config.activity_window_days;
    let windows = [report_window, Window::trailing(activity_days)];

    info!("Refreshing cache for {} repositories", ctx.repos.len());

    let mut per_window = aggregator
        .summarize_all_windows(&ctx.repos, &windows)
        .await
        .into_iter();
    let report_summaries = per_window.next().unwrap_or_default();
    let activity_summaries = per_window.next().unwrap_or_default();

    if let Err(e) = aggregator
        .store_report(&report_window, report_summaries, started)
        .await
    {
        warn!("Dashboard report not refreshed: {}", e);
    }

    // default-branch commits and contributors
    let inactive = aggregator.inactive_members(&ctx.repos, activity_days).await;

    info!(
        "Cache refresh done in {:.2}s: {} active-window summaries, {} inactive members",
        started.elapsed().as_secs_f64(),
        activity_summaries.len(),
        inactive.len()
    );
}

/// Refresh once at startup, then on every tick of the configured interval
/// that the policy allows.
pub async fn run_refresh(ctx: Arc<Context>) {
    let policy = RefreshPolicy::from_config(&ctx.config);
    let period = ctx.config.refresh_interval;

    info!("Initial cache refresh");
    refresh_once(&ctx).await;

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if policy.should_refresh(Utc::now()) {
            refresh_once(&ctx).await;
        } else {
            debug!("Off-peak weekday, skipping cache refresh");
        }
    }
}

/// Compute inactive members over the activity window and send the notice.
pub async fn send_inactive_notice(ctx: &Context, notifier: &dyn Notifier) -> Result<()> {
    info!("Running end-of-day check for inactive members");
    let inactive = ctx
        .aggregator
        .inactive_members(&ctx.repos, ctx.config.activity_window_days)
        .await;
    notifier.send(&format_inactive_notice(&inactive)).await
}

/// Send the inactive-members notice every day at 23:59 local time.
pub async fn run_daily_notice(ctx: Arc<Context>, notifier: Arc<dyn Notifier>) {
    loop {
        let now = Utc::now();
        let Some(next) = next_daily_run(now, ctx.config.utc_offset, NOTICE_HOUR, NOTICE_MINUTE)
        else {
            error!("Could not compute the next notice time, daily notice disabled");
            return;
        };

        debug!("Next inactive-members notice at {}", next);
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        if let Err(e) = send_inactive_notice(&ctx, notifier.as_ref()).await {
            error!("Error sending inactive members notice: {}", e);
        }
    }
}

/// Spawn the refresh loop and the daily notice.
pub fn spawn(ctx: Arc<Context>, notifier: Arc<dyn Notifier>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_refresh(Arc::clone(&ctx))),
        tokio::spawn(run_daily_notice(ctx, notifier)),
    ]
}
