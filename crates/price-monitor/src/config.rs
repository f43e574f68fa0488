use chrono::NaiveTime;
use chrono_tz::Tz;
use monitor_core::HistoryRequest;
use notification_service::{NotificationConfig, NotificationError};
use std::str::FromStr;
use std::time::Duration;

/// Startup configuration failures. Any of these stops the process before the
/// monitoring loop begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    // Watchlist, in configuration order
    pub symbols: Vec<String>,

    // Signal parameters
    pub threshold_drop: f64, // 5.0 (%)
    pub ma_window: usize,    // 200 bars
    pub lookback_days: u32,  // 400 calendar days, more for long windows

    // Scheduling
    pub sleep_time_seconds: u64, // 60
    pub summary_time: NaiveTime, // 21:30
    pub timezone: Option<Tz>,    // None = system local time

    // Presentation
    pub currency_prefix: String, // "USD$"

    // Market data
    pub polygon_api_key: String,
    pub polygon_base_url: String,
    pub polygon_rate_limit: usize, // requests per minute

    // Notifications
    pub notification: NotificationConfig,
    pub notify_on_startup: bool,

    // Ambient
    pub http_timeout_seconds: u64,
    pub metrics_log_interval_cycles: u64,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let symbols = parse_symbols(&get("STOCK_SYMBOLS").unwrap_or_else(|| "AAPL".to_string()));
        if symbols.is_empty() {
            return Err(ConfigError::Invalid {
                key: "STOCK_SYMBOLS",
                value: get("STOCK_SYMBOLS").unwrap_or_default(),
                reason: "no symbols configured".into(),
            });
        }

        let threshold_drop: f64 = parse_or(&get, "THRESHOLD_DROP", 5.0)?;
        if !threshold_drop.is_finite() || threshold_drop <= 0.0 {
            return Err(invalid("THRESHOLD_DROP", threshold_drop, "must be a positive percentage"));
        }

        let ma_window: usize = parse_or(&get, "MA_WINDOW", 200)?;
        if ma_window == 0 {
            return Err(invalid("MA_WINDOW", ma_window, "must be at least 1"));
        }

        let min_lookback = HistoryRequest::lookback_for_window(ma_window)
            .ok_or_else(|| invalid("MA_WINDOW", ma_window, "window too large"))?;
        let lookback_days: u32 = parse_or(&get, "LOOKBACK_DAYS", min_lookback.max(400))?;
        if HistoryRequest::max_trading_days(lookback_days) < ma_window + 1 {
            return Err(invalid(
                "LOOKBACK_DAYS",
                lookback_days,
                &format!(
                    "{} calendar days hold at most {} daily bars, MA_WINDOW={} needs {}",
                    lookback_days,
                    HistoryRequest::max_trading_days(lookback_days),
                    ma_window,
                    ma_window + 1
                ),
            ));
        }

        let sleep_time_seconds: u64 = parse_or(&get, "SLEEP_TIME", 60)?;
        if sleep_time_seconds == 0 {
            return Err(invalid("SLEEP_TIME", sleep_time_seconds, "must be at least 1 second"));
        }

        let summary_raw = get("SUMMARY_TIME").unwrap_or_else(|| "21:30".to_string());
        let summary_time = parse_summary_time(&summary_raw)?;

        let timezone = match get("MONITOR_TIMEZONE").filter(|s| !s.trim().is_empty()) {
            Some(name) => Some(name.trim().parse::<Tz>().map_err(|_| ConfigError::Invalid {
                key: "MONITOR_TIMEZONE",
                value: name.clone(),
                reason: "unknown IANA timezone".into(),
            })?),
            None => None,
        };

        let polygon_api_key = get("POLYGON_API_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("POLYGON_API_KEY"))?;

        let notification = NotificationConfig::from_lookup(&get)?;

        Ok(Self {
            symbols,
            threshold_drop,
            ma_window,
            lookback_days,
            sleep_time_seconds,
            summary_time,
            timezone,
            currency_prefix: get("CURRENCY_PREFIX").unwrap_or_else(|| "USD$".to_string()),
            polygon_api_key,
            polygon_base_url: get("POLYGON_BASE_URL")
                .unwrap_or_else(|| polygon_client::DEFAULT_BASE_URL.to_string()),
            polygon_rate_limit: parse_or(&get, "POLYGON_RATE_LIMIT", 5)?,
            notification,
            notify_on_startup: parse_or(&get, "NOTIFY_ON_STARTUP", false)?,
            http_timeout_seconds: parse_or(&get, "HTTP_TIMEOUT_SECS", 30)?,
            metrics_log_interval_cycles: parse_or(&get, "METRICS_LOG_INTERVAL_CYCLES", 60)?,
        })
    }

    pub fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.sleep_time_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Trim, upper-case, drop empties and duplicates (first occurrence wins).
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_summary_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| ConfigError::Invalid {
            key: "SUMMARY_TIME",
            value: raw.to_string(),
            reason: format!("expected HH:MM ({})", e),
        })
}

fn parse_or<T, F>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
