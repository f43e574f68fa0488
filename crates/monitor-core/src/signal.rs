use crate::{AlertDecision, MonitorError, PriceSnapshot};

/// Simple Moving Average over the trailing `period` values.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }

    let window = &data[data.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Derive a [`PriceSnapshot`] from daily closes (oldest first).
///
/// Needs `ma_window + 1` closes: the full window ending at the current close
/// and one earlier close for the day-over-day comparison.
pub fn evaluate(history: &[f64], ma_window: usize) -> Result<PriceSnapshot, MonitorError> {
    if ma_window == 0 {
        return Err(MonitorError::DataUnavailable(
            "moving-average window must be at least 1".to_string(),
        ));
    }

    let required = ma_window + 1;
    if history.len() < required {
        return Err(MonitorError::DataUnavailable(format!(
            "not enough data to calculate {}-day MA: have {} closes, need {}",
            ma_window,
            history.len(),
            required
        )));
    }

    let current_price = history[history.len() - 1];
    let previous_close = history[history.len() - 2];

    if !current_price.is_finite() || !previous_close.is_finite() {
        return Err(MonitorError::DataUnavailable(
            "non-finite closing price".to_string(),
        ));
    }
    if previous_close == 0.0 {
        return Err(MonitorError::DataUnavailable(
            "previous close is zero, drop percentage undefined".to_string(),
        ));
    }

    let moving_average = sma(history, ma_window)
        .filter(|ma| ma.is_finite())
        .ok_or_else(|| {
            MonitorError::DataUnavailable(format!("could not compute {}-day MA", ma_window))
        })?;

    let drop_percentage = (previous_close - current_price) / previous_close * 100.0;

    Ok(PriceSnapshot {
        current_price,
        previous_close,
        moving_average,
        drop_percentage,
    })
}

/// Alert only when the price is below its MA *and* fell at least
/// `threshold_drop` percent from the previous close.
pub fn decide(snapshot: &PriceSnapshot, threshold_drop: f64) -> AlertDecision {
    let below_ma = snapshot.current_price < snapshot.moving_average;
    let dropped = snapshot.drop_percentage >= threshold_drop;

    AlertDecision {
        should_alert: below_ma && dropped,
        drop_percentage: snapshot.drop_percentage,
    }
}
