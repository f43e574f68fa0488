use async_trait::async_trait;
use monitor_core::{MonitorError, Notifier};
use reqwest::Client;
use serde::Deserialize;

use crate::split_message;

const TELEGRAM_API: &str = "https://api.telegram.org";
/// Telegram rejects message text longer than this.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Sends plain-text messages to one Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(client: Client, bot_token: String, chat_id: String) -> Self {
        Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        }
    }

    /// Point at another Bot API server (self-hosted, or a test double).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send_chunk(&self, text: &str) -> Result<(), MonitorError> {
        let url = self.send_message_url();
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        // The URL carries the bot token, so strip it from transport errors.
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Unreachable(format!("telegram: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        interpret_response(status.as_u16(), &body)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<(), MonitorError> {
    let parsed: Option<TelegramResponse> = serde_json::from_str(body).ok();

    match parsed {
        Some(resp) if resp.ok && (200..300).contains(&status) => Ok(()),
        Some(resp) => Err(MonitorError::Unreachable(format!(
            "telegram HTTP {}: {}",
            status,
            resp.description.unwrap_or_else(|| "request rejected".to_string())
        ))),
        None => Err(MonitorError::Unreachable(format!(
            "telegram HTTP {}: unexpected response body",
            status
        ))),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), MonitorError> {
        for chunk in split_message(message, TELEGRAM_MESSAGE_LIMIT) {
            self.send_chunk(&chunk).await?;
        }
        tracing::debug!("Telegram notification sent to chat {}", self.chat_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() {
        let notifier = TelegramNotifier::new(Client::new(), "123:abc".into(), "42".into());
        assert_eq!(
            notifier.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );

        let notifier = notifier.with_api_base("http://localhost:8081/");
        assert_eq!(
            notifier.send_message_url(),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_ok_response() {
        let body = r#"{"ok":true,"result":{"message_id":7}}"#;
        assert!(interpret_response(200, body).is_ok());
    }

    #[test]
    fn test_error_response_carries_description() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        match interpret_response(400, body) {
            Err(MonitorError::Unreachable(msg)) => assert!(msg.contains("chat not found")),
            other => panic!("expected Unreachable, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_response_is_unreachable() {
        assert!(matches!(
            interpret_response(502, "<html>Bad Gateway</html>"),
            Err(MonitorError::Unreachable(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Only run with valid BOT_TOKEN and CHAT_ID
    async fn test_send_live() {
        let notifier = TelegramNotifier::new(
            Client::new(),
            std::env::var("BOT_TOKEN").unwrap(),
            std::env::var("CHAT_ID").unwrap(),
        );
        notifier.send("price-monitor test message").await.unwrap();
    }
}
