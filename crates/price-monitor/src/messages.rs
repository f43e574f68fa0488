use chrono::NaiveDate;
use monitor_core::{MonitorError, PriceSnapshot};

use crate::monitor::MonitorSettings;

/// Render a percentage threshold the way people write it: `5.0`, `7.5`.
fn fmt_threshold(threshold: f64) -> String {
    if threshold.fract() == 0.0 {
        format!("{:.1}", threshold)
    } else {
        format!("{}", threshold)
    }
}

pub fn alert_message(symbol: &str, snapshot: &PriceSnapshot, settings: &MonitorSettings) -> String {
    let cur = &settings.currency_prefix;
    let window = settings.ma_window;
    format!(
        "⚠️ {symbol} dropped below its {window}-day MA and more than {threshold}% from previous close!\n\
         Current Price: {cur}{current:.2}\n\
         Previous Close: {cur}{previous:.2}\n\
         {window}-day MA: {cur}{ma:.2}\n\
         Drop Percentage: {drop:.2}%",
        threshold = fmt_threshold(settings.threshold_drop),
        current = snapshot.current_price,
        previous = snapshot.previous_close,
        ma = snapshot.moving_average,
        drop = snapshot.drop_percentage,
    )
}

pub fn daily_summary(
    date: NaiveDate,
    results: &[(String, Result<PriceSnapshot, MonitorError>)],
    settings: &MonitorSettings,
) -> String {
    let cur = &settings.currency_prefix;
    let window = settings.ma_window;
    let mut blocks = vec![format!("📊 Daily Summary ({})", date.format("%Y-%m-%d"))];

    for (symbol, result) in results {
        let block = match result {
            Ok(snapshot) => format!(
                "{symbol}\n\
                 Current Price: {cur}{current:.2}\n\
                 Previous Close: {cur}{previous:.2}\n\
                 {window}-day MA: {cur}{ma:.2}\n\
                 Drop Percentage: {drop:.2}%",
                current = snapshot.current_price,
                previous = snapshot.previous_close,
                ma = snapshot.moving_average,
                drop = snapshot.drop_percentage,
            ),
            Err(e) => format!("{}: data unavailable ({})", symbol, reason(e)),
        };
        blocks.push(block);
    }

    blocks.join("\n\n")
}

pub fn startup_message(settings: &MonitorSettings, sleep_seconds: u64) -> String {
    format!(
        "Price monitor started\n\
         Watching: {}\n\
         Alert: below {}-day MA and drop >= {}% | Check every {}s | Daily summary at {}",
        settings.symbols.join(", "),
        settings.ma_window,
        fmt_threshold(settings.threshold_drop),
        sleep_seconds,
        settings.summary_time.format("%H:%M"),
    )
}

fn reason(e: &MonitorError) -> &str {
    match e {
        MonitorError::DataUnavailable(msg) | MonitorError::Unreachable(msg) => msg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn settings() -> MonitorSettings {
        MonitorSettings {
            symbols: vec!["AAA".into(), "BBB".into()],
            ma_window: 200,
            threshold_drop: 5.0,
            lookback_days: 400,
            summary_time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            currency_prefix: "USD$".into(),
        }
    }

    fn snapshot() -> PriceSnapshot {
        PriceSnapshot {
            current_price: 99.0,
            previous_close: 105.0,
            moving_average: 110.004,
            drop_percentage: 5.714285714,
        }
    }

    #[test]
    fn test_alert_message_format() {
        let msg = alert_message("BBB", &snapshot(), &settings());
        assert_eq!(
            msg,
            "⚠️ BBB dropped below its 200-day MA and more than 5.0% from previous close!\n\
             Current Price: USD$99.00\n\
             Previous Close: USD$105.00\n\
             200-day MA: USD$110.00\n\
             Drop Percentage: 5.71%"
        );
    }

    #[test]
    fn test_threshold_rendering() {
        assert_eq!(fmt_threshold(5.0), "5.0");
        assert_eq!(fmt_threshold(7.5), "7.5");
        assert_eq!(fmt_threshold(12.25), "12.25");
    }

    #[test]
    fn test_daily_summary_inlines_errors() {
        let results = vec![
            (
                "AAA".to_string(),
                Err(MonitorError::DataUnavailable("no price history returned for AAA".into())),
            ),
            ("BBB".to_string(), Ok(snapshot())),
        ];
        let date = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let msg = daily_summary(date, &results, &settings());

        assert!(msg.starts_with("📊 Daily Summary (2024-03-08)"));
        assert!(msg.contains("AAA: data unavailable (no price history returned for AAA)"));
        assert!(msg.contains("BBB\nCurrent Price: USD$99.00"));
        assert!(msg.contains("200-day MA: USD$110.00"));
        assert!(msg.contains("Drop Percentage: 5.71%"));
        // AAA block comes before BBB block
        assert!(msg.find("AAA").unwrap() < msg.find("BBB").unwrap());
    }

    #[test]
    fn test_startup_message_lists_symbols() {
        let msg = startup_message(&settings(), 60);
        assert!(msg.contains("AAA, BBB"));
        assert!(msg.contains("21:30"));
    }
}
