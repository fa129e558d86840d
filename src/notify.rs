// Outbound notices.
// The daily inactive-members notice goes through a Notifier: the log, or a chat webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::error::{PulseError, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Writes notices to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!("Notification:\n{}", message);
        Ok(())
    }
}

/// Posts `{"content": message}` to a chat webhook (Discord and Slack-compatible shapes accept it).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// A post that takes longer than `timeout` fails with `UpstreamTimeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PulseError::Api)?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "content": message }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::UpstreamTimeout
                } else {
                    PulseError::Api(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PulseError::Upstream {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

/// The end-of-day message listing members without commits.
pub fn format_inactive_notice(inactive: &[String]) -> String {
    if inactive.is_empty() {
        return "**All members have been active today.**".to_string();
    }

    let lines: Vec<String> = inactive.iter().map(|user| format!("• {}", user)).collect();
    format!("**Inactive members today:**\n{}", lines.join("\n"))
}
