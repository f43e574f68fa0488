use std::time::Instant;

use crate::monitor::CycleReport;

/// Running counters for the monitor loop, logged every N cycles.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    pub cycles_run: u64,
    pub snapshots_evaluated: u64,
    pub snapshots_unavailable: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
    pub summaries_sent: u64,
    pub summaries_failed: u64,
    pub last_cycle_duration_ms: u64,
    log_interval_cycles: u64,
}

impl MonitorMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            log_interval_cycles,
            ..Default::default()
        }
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn record_cycle(&mut self, report: &CycleReport, start: Instant) {
        self.cycles_run += 1;
        self.snapshots_evaluated += report.evaluated as u64;
        self.snapshots_unavailable += report.unavailable as u64;
        self.alerts_sent += report.alerts_sent as u64;
        self.alerts_failed += report.alerts_failed as u64;
        if report.summary_sent {
            self.summaries_sent += 1;
        }
        if report.summary_failed {
            self.summaries_failed += 1;
        }
        self.last_cycle_duration_ms = start.elapsed().as_millis() as u64;
    }

    pub fn should_log(&self) -> bool {
        self.log_interval_cycles > 0 && self.cycles_run % self.log_interval_cycles == 0
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            evaluated = self.snapshots_evaluated,
            unavailable = self.snapshots_unavailable,
            alerts_sent = self.alerts_sent,
            alerts_failed = self.alerts_failed,
            summaries_sent = self.summaries_sent,
            summaries_failed = self.summaries_failed,
            last_cycle_ms = self.last_cycle_duration_ms,
            "Monitor metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle_accumulates() {
        let mut metrics = MonitorMetrics::new(2);
        let report = CycleReport {
            evaluated: 2,
            unavailable: 1,
            alerts_sent: 1,
            alerts_failed: 0,
            summary_sent: true,
            summary_failed: false,
        };

        metrics.record_cycle(&report, MonitorMetrics::start_timer());
        assert!(!metrics.should_log());
        metrics.record_cycle(&CycleReport::default(), MonitorMetrics::start_timer());
        assert!(metrics.should_log());

        assert_eq!(metrics.cycles_run, 2);
        assert_eq!(metrics.snapshots_evaluated, 2);
        assert_eq!(metrics.snapshots_unavailable, 1);
        assert_eq!(metrics.alerts_sent, 1);
        assert_eq!(metrics.summaries_sent, 1);
        assert_eq!(metrics.summaries_failed, 0);
    }

    #[test]
    fn test_zero_interval_never_logs() {
        let mut metrics = MonitorMetrics::new(0);
        metrics.record_cycle(&CycleReport::default(), MonitorMetrics::start_timer());
        assert!(!metrics.should_log());
    }
}
