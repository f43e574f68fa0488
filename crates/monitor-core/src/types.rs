use chrono::NaiveDate;

/// Values derived from one history fetch. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSnapshot {
    pub current_price: f64,
    pub previous_close: f64,
    pub moving_average: f64,
    pub drop_percentage: f64,
}

/// Outcome of the alert rule for one symbol in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub drop_percentage: f64,
}

/// Holiday allowance on top of the weekday arithmetic, in calendar days.
const HOLIDAY_SLACK_DAYS: u64 = 30;

/// How much history a price source should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Last calendar day of the window, in the monitor's wall-clock zone.
    pub as_of: NaiveDate,
    /// Calendar days to look back from `as_of`.
    pub lookback_days: u32,
    /// Minimum number of daily closes the caller needs.
    pub min_points: usize,
}

impl HistoryRequest {
    /// Request covering a moving-average window plus one extra close for the
    /// previous-day comparison.
    pub fn for_window(ma_window: usize, lookback_days: u32, as_of: NaiveDate) -> Self {
        Self {
            as_of,
            lookback_days,
            min_points: ma_window + 1,
        }
    }

    /// Upper bound on daily bars in a calendar span: weekdays only.
    pub fn max_trading_days(lookback_days: u32) -> usize {
        (u64::from(lookback_days) * 5 / 7) as usize
    }

    /// Calendar days needed to hold `ma_window + 1` daily bars, with slack
    /// for exchange holidays. `None` if it does not fit in a `u32`.
    pub fn lookback_for_window(ma_window: usize) -> Option<u32> {
        let bars = (ma_window as u64).checked_add(1)?;
        let days = bars.checked_mul(7)?.div_ceil(5).checked_add(HOLIDAY_SLACK_DAYS)?;
        u32::try_from(days).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_trading_days() {
        assert_eq!(HistoryRequest::max_trading_days(7), 5);
        assert_eq!(HistoryRequest::max_trading_days(400), 285);
        assert_eq!(HistoryRequest::max_trading_days(0), 0);
    }

    #[test]
    fn test_lookback_for_window_covers_bars() {
        for window in [1usize, 20, 200, 300, 1000] {
            let days = HistoryRequest::lookback_for_window(window).unwrap();
            assert!(
                HistoryRequest::max_trading_days(days) >= window + 1,
                "window {} -> {} days",
                window,
                days
            );
        }
        assert_eq!(HistoryRequest::lookback_for_window(200), Some(312));
        assert_eq!(HistoryRequest::lookback_for_window(usize::MAX), None);
    }
}
