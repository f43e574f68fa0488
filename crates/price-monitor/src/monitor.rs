use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use monitor_core::{
    decide, evaluate, HistoryRequest, MonitorError, Notifier, PriceSnapshot, PriceSource,
};

use crate::config::MonitorConfig;
use crate::messages;
use crate::metrics::MonitorMetrics;

/// The slice of configuration the loop itself needs.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub symbols: Vec<String>,
    pub ma_window: usize,
    pub threshold_drop: f64,
    pub lookback_days: u32,
    pub summary_time: NaiveTime,
    pub currency_prefix: String,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            symbols: config.symbols.clone(),
            ma_window: config.ma_window,
            threshold_drop: config.threshold_drop,
            lookback_days: config.lookback_days,
            summary_time: config.summary_time,
            currency_prefix: config.currency_prefix.clone(),
        }
    }
}

/// Process-lifetime state. Lost on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub last_summary_sent_date: Option<NaiveDate>,
}

impl MonitorState {
    /// Past the summary time and nothing sent yet for `now`'s calendar date.
    pub fn summary_due(&self, now: NaiveDateTime, summary_time: NaiveTime) -> bool {
        if now.time() < summary_time {
            return false;
        }
        match self.last_summary_sent_date {
            None => true,
            Some(last) => last < now.date(),
        }
    }
}

/// What happened during one pass over the watchlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub evaluated: usize,
    pub unavailable: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub summary_sent: bool,
    pub summary_failed: bool,
}

/// Wall-clock used for the daily-summary gate.
#[derive(Debug, Clone, Copy)]
pub enum WallClock {
    Local,
    Zone(Tz),
}

impl WallClock {
    pub fn from_timezone(timezone: Option<Tz>) -> Self {
        timezone.map_or(WallClock::Local, WallClock::Zone)
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            WallClock::Local => chrono::Local::now().naive_local(),
            WallClock::Zone(tz) => Utc::now().with_timezone(tz).naive_local(),
        }
    }
}

pub struct MonitorLoop {
    settings: MonitorSettings,
    source: Box<dyn PriceSource>,
    notifier: Box<dyn Notifier>,
    clock: WallClock,
    state: MonitorState,
    metrics: MonitorMetrics,
}

impl MonitorLoop {
    pub fn new(
        settings: MonitorSettings,
        source: Box<dyn PriceSource>,
        notifier: Box<dyn Notifier>,
        clock: WallClock,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            settings,
            source,
            notifier,
            clock,
            state: MonitorState::default(),
            metrics,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    /// Run cycles until `shutdown` resolves. Shutdown is only observed
    /// between cycles, so a cycle in flight always completes.
    pub async fn run<F>(&mut self, sleep_time: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = self.clock.now();
            self.run_cycle(now).await;

            tokio::select! {
                _ = tokio::time::sleep(sleep_time) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, exiting gracefully...");
                    break;
                }
            }
        }

        self.metrics.log_metrics();
    }

    /// One pass: every symbol in order, then the daily-summary gate.
    pub async fn run_cycle(&mut self, now: NaiveDateTime) -> CycleReport {
        let start = MonitorMetrics::start_timer();
        let mut report = CycleReport::default();
        let request = HistoryRequest::for_window(
            self.settings.ma_window,
            self.settings.lookback_days,
            now.date(),
        );

        let mut results = Vec::with_capacity(self.settings.symbols.len());
        for symbol in &self.settings.symbols {
            let result = self.check_symbol(symbol, &request, &mut report).await;
            results.push((symbol.clone(), result));
        }

        if self.state.summary_due(now, self.settings.summary_time) {
            self.send_summary(now.date(), &results, &mut report).await;
        }

        self.metrics.record_cycle(&report, start);
        if self.metrics.should_log() {
            self.metrics.log_metrics();
        }

        tracing::debug!(
            "Cycle #{} complete in {}ms: {} evaluated, {} unavailable, {} alerts",
            self.metrics.cycles_run,
            self.metrics.last_cycle_duration_ms,
            report.evaluated,
            report.unavailable,
            report.alerts_sent
        );
        report
    }

    async fn check_symbol(
        &self,
        symbol: &str,
        request: &HistoryRequest,
        report: &mut CycleReport,
    ) -> Result<PriceSnapshot, MonitorError> {
        let snapshot = match self
            .source
            .fetch_history(symbol, request)
            .await
            .and_then(|history| evaluate(&history, self.settings.ma_window))
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report.unavailable += 1;
                tracing::info!("Skipping {} this cycle: {}", symbol, e);
                return Err(e);
            }
        };
        report.evaluated += 1;

        tracing::info!(
            "Current {} price: {:.2}, Previous close: {:.2}, {}MA: {:.2}, Previous Close vs Current Price: {:.2}%",
            symbol,
            snapshot.current_price,
            snapshot.previous_close,
            self.settings.ma_window,
            snapshot.moving_average,
            snapshot.drop_percentage
        );

        let decision = decide(&snapshot, self.settings.threshold_drop);
        if !decision.should_alert {
            tracing::info!(
                "{} is above {}-day MA or drop percentage is below threshold. No alert sent.",
                symbol,
                self.settings.ma_window
            );
            return Ok(snapshot);
        }

        let message = messages::alert_message(symbol, &snapshot, &self.settings);
        match self.notifier.send(&message).await {
            Ok(()) => {
                report.alerts_sent += 1;
                tracing::info!(
                    "Alert sent for {} via {} (drop {:.2}%)",
                    symbol,
                    self.notifier.name(),
                    decision.drop_percentage
                );
            }
            Err(e) => {
                report.alerts_failed += 1;
                tracing::warn!(
                    "Failed to send alert for {} via {}: {}",
                    symbol,
                    self.notifier.name(),
                    e
                );
            }
        }

        Ok(snapshot)
    }

    async fn send_summary(
        &mut self,
        today: NaiveDate,
        results: &[(String, Result<PriceSnapshot, MonitorError>)],
        report: &mut CycleReport,
    ) {
        tracing::info!("Generating daily summary for {}", today);
        let message = messages::daily_summary(today, results, &self.settings);

        match self.notifier.send(&message).await {
            Ok(()) => {
                self.state.last_summary_sent_date = Some(today);
                report.summary_sent = true;
                tracing::info!("Daily summary sent via {}", self.notifier.name());
            }
            Err(e) => {
                // State untouched: the next cycle tries again.
                report.summary_failed = true;
                tracing::warn!("Failed to send daily summary: {}", e);
            }
        }
    }

    /// Best-effort "monitor is up" message.
    pub async fn send_startup_notice(&self, sleep_seconds: u64) {
        let message = messages::startup_message(&self.settings, sleep_seconds);
        if let Err(e) = self.notifier.send(&message).await {
            tracing::warn!("Failed to send startup notification: {}", e);
        }
    }
}
