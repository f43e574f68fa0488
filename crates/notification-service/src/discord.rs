use async_trait::async_trait;
use monitor_core::{MonitorError, Notifier};
use reqwest::Client;
use serde_json::json;

use crate::split_message;

/// Discord rejects webhook content longer than this.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordWebhookNotifier {
    pub fn new(client: Client, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), MonitorError> {
        for chunk in split_message(message, DISCORD_MESSAGE_LIMIT) {
            let payload = json!({
                "content": chunk,
                "username": "Price Monitor",
            });

            let response = self
                .client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| MonitorError::Unreachable(format!("discord: {}", e.without_url())))?;

            if !response.status().is_success() {
                return Err(MonitorError::Unreachable(format!(
                    "discord HTTP {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                )));
            }
        }

        tracing::debug!("Discord notification sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
