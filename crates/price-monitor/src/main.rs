use anyhow::Result;
use notification_service::build_notifier;
use polygon_client::PolygonClient;
use tokio::signal::unix::SignalKind;

mod config;
mod messages;
mod metrics;
mod monitor;

use config::MonitorConfig;
use metrics::MonitorMetrics;
use monitor::{MonitorLoop, MonitorSettings, WallClock};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting price monitor");

    // 2. Load configuration; refuse to start on anything missing
    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Symbols: {}", config.symbols.join(","));
    tracing::info!(
        "  Alert: below {}-day MA and drop >= {}%",
        config.ma_window,
        config.threshold_drop
    );
    tracing::info!("  Check interval: {} seconds", config.sleep_time_seconds);
    tracing::info!(
        "  Daily summary at {} ({})",
        config.summary_time.format("%H:%M"),
        config
            .timezone
            .map(|tz| tz.name().to_string())
            .unwrap_or_else(|| "local time".to_string())
    );

    // 3. Market data
    let source = PolygonClient::new(
        config.polygon_api_key.clone(),
        config.polygon_rate_limit,
        config.http_timeout(),
    )?
    .with_base_url(config.polygon_base_url.clone());
    tracing::info!(
        "Polygon client ready ({}, {} req/min)",
        source.base_url(),
        config.polygon_rate_limit
    );

    // 4. Notifier
    let notifier = build_notifier(&config.notification, config.http_timeout())?;

    let mut monitor = MonitorLoop::new(
        MonitorSettings::from(&config),
        Box::new(source),
        notifier,
        WallClock::from_timezone(config.timezone),
        MonitorMetrics::new(config.metrics_log_interval_cycles),
    );

    if config.notify_on_startup {
        monitor.send_startup_notice(config.sleep_time_seconds).await;
    }

    // 5. Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };

    tracing::info!(
        "Start monitoring stocks... checking every {}s. Press Ctrl+C to stop.",
        config.sleep_time_seconds
    );
    monitor.run(config.sleep_time(), shutdown).await;

    tracing::info!(
        "Price monitor shut down after {} cycles (last daily summary: {})",
        monitor.metrics().cycles_run,
        monitor
            .state()
            .last_summary_sent_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}
