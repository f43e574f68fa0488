mod discord;
mod telegram;

pub use discord::DiscordWebhookNotifier;
pub use telegram::TelegramNotifier;

use monitor_core::Notifier;
use std::fmt;
use std::time::Duration;

/// Errors building a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Which single destination this process delivers to.
#[derive(Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    Telegram { bot_token: String, chat_id: String },
    Discord { webhook_url: String },
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelConfig::Telegram { chat_id, .. } => f
                .debug_struct("Telegram")
                .field("bot_token", &"<redacted>")
                .field("chat_id", chat_id)
                .finish(),
            ChannelConfig::Discord { .. } => f
                .debug_struct("Discord")
                .field("webhook_url", &"<redacted>")
                .finish(),
        }
    }
}

/// Configuration for the notification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub channel: ChannelConfig,
    /// Bot API root override (`TELEGRAM_API_BASE`), e.g. a local Bot API server.
    pub telegram_api_base: Option<String>,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, NotificationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, NotificationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let kind = non_empty("NOTIFY_CHANNEL").unwrap_or_else(|| "telegram".to_string());

        let channel = match kind.to_ascii_lowercase().as_str() {
            "telegram" => ChannelConfig::Telegram {
                bot_token: non_empty("BOT_TOKEN")
                    .ok_or_else(|| NotificationError::Config("BOT_TOKEN not set".into()))?,
                chat_id: non_empty("CHAT_ID")
                    .ok_or_else(|| NotificationError::Config("CHAT_ID not set".into()))?,
            },
            "discord" => {
                let webhook_url = non_empty("DISCORD_WEBHOOK_URL").ok_or_else(|| {
                    NotificationError::Config("DISCORD_WEBHOOK_URL not set".into())
                })?;
                if !webhook_url.starts_with("https://") && !webhook_url.starts_with("http://") {
                    return Err(NotificationError::Config(
                        "DISCORD_WEBHOOK_URL must be an http(s) URL".into(),
                    ));
                }
                ChannelConfig::Discord { webhook_url }
            }
            other => {
                return Err(NotificationError::Config(format!(
                    "unknown NOTIFY_CHANNEL '{}' (expected telegram or discord)",
                    other
                )))
            }
        };

        Ok(Self {
            channel,
            telegram_api_base: non_empty("TELEGRAM_API_BASE"),
        })
    }
}

/// Build the one notifier this process sends through.
pub fn build_notifier(
    config: &NotificationConfig,
    timeout: Duration,
) -> Result<Box<dyn Notifier>, NotificationError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let notifier: Box<dyn Notifier> = match &config.channel {
        ChannelConfig::Telegram { bot_token, chat_id } => {
            tracing::info!("Telegram notifications enabled (chat {})", chat_id);
            let notifier = TelegramNotifier::new(client, bot_token.clone(), chat_id.clone());
            match &config.telegram_api_base {
                Some(base) => Box::new(notifier.with_api_base(base.clone())),
                None => Box::new(notifier),
            }
        }
        ChannelConfig::Discord { webhook_url } => {
            tracing::info!("Discord webhook notifications enabled");
            Box::new(DiscordWebhookNotifier::new(client, webhook_url.clone()))
        }
    };

    Ok(notifier)
}

/// Split `text` into chunks of at most `limit` characters, breaking on line
/// boundaries where possible. Lines longer than `limit` are hard-split.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for line in text.split('\n') {
        for segment in hard_split(line, limit) {
            let seg_len = segment.chars().count();
            current = match current.take() {
                None => Some((segment, seg_len)),
                Some((mut buf, len)) if len + 1 + seg_len <= limit => {
                    buf.push('\n');
                    buf.push_str(&segment);
                    Some((buf, len + 1 + seg_len))
                }
                Some((buf, _)) => {
                    chunks.push(buf);
                    Some((segment, seg_len))
                }
            };
        }
    }

    if let Some((buf, _)) = current {
        chunks.push(buf);
    }
    chunks
}

fn hard_split(line: &str, limit: usize) -> Vec<String> {
    if line.chars().count() <= limit {
        return vec![line.to_string()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}
