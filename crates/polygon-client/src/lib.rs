use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use monitor_core::{HistoryRequest, MonitorError, PriceSource};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Errors talking to the Polygon REST API.
#[derive(Debug, thiserror::Error)]
pub enum PolygonError {
    #[error("request failed: {0}")]
    Http(reqwest::Error),
    #[error("rate limited by Polygon (HTTP 429)")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// The request URL carries the API key, so it never goes into the error.
impl From<reqwest::Error> for PolygonError {
    fn from(e: reqwest::Error) -> Self {
        PolygonError::Http(e.without_url())
    }
}

impl From<PolygonError> for MonitorError {
    fn from(e: PolygonError) -> Self {
        MonitorError::DataUnavailable(e.to_string())
    }
}

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => {
                    (oldest + self.window).saturating_duration_since(now) + Duration::from_millis(50)
                }
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for Polygon API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Daily-bar client for the Polygon aggregates endpoint.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// `rate_limit` is requests per minute (5 on the free tier).
    pub fn new(api_key: String, rate_limit: usize, timeout: Duration) -> Result<Self, PolygonError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rate-limited send. A 429 is reported, not retried.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PolygonError> {
        self.rate_limiter.acquire().await;
        let response = builder.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            tracing::warn!("Polygon rate limit hit, skipping until next cycle");
            return Err(PolygonError::RateLimited);
        }
        if !status.is_success() {
            return Err(PolygonError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }

    /// Adjusted daily closes for `symbol` between `from` and `to` inclusive,
    /// oldest first.
    pub async fn get_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<f64>, PolygonError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        let agg_response: AggregateResponse = response.json().await?;
        Ok(agg_response.into_closes())
    }
}

#[async_trait]
impl PriceSource for PolygonClient {
    async fn fetch_history(
        &self,
        symbol: &str,
        request: &HistoryRequest,
    ) -> Result<Vec<f64>, MonitorError> {
        let (from, to) = date_range(request);
        let closes = self.get_daily_closes(symbol, from, to).await?;
        check_history(symbol, closes, request)
    }

    fn name(&self) -> &str {
        "polygon"
    }
}

/// Calendar range ending on the request's `as_of` date.
fn date_range(request: &HistoryRequest) -> (NaiveDate, NaiveDate) {
    let to = request.as_of;
    (to - ChronoDuration::days(i64::from(request.lookback_days)), to)
}

fn check_history(
    symbol: &str,
    closes: Vec<f64>,
    request: &HistoryRequest,
) -> Result<Vec<f64>, MonitorError> {
    if closes.is_empty() {
        return Err(MonitorError::DataUnavailable(format!(
            "no price history returned for {}",
            symbol
        )));
    }
    if closes.len() < request.min_points {
        return Err(MonitorError::DataUnavailable(format!(
            "not enough data for {}: {} closes in {} days, need {}",
            symbol,
            closes.len(),
            request.lookback_days,
            request.min_points
        )));
    }
    Ok(closes)
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp (ms)
    c: f64, // close
}

impl AggregateResponse {
    fn into_closes(mut self) -> Vec<f64> {
        self.results.sort_by_key(|r| r.t);
        self.results.into_iter().map(|r| r.c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_response_sorted_oldest_first() {
        let body = r#"{
            "ticker": "AAPL",
            "status": "OK",
            "resultsCount": 3,
            "results": [
                {"t": 1700265600000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 189.69, "v": 10.0},
                {"t": 1700092800000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 188.01, "v": 10.0},
                {"t": 1700179200000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 189.71, "v": 10.0}
            ]
        }"#;

        let resp: AggregateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.into_closes(), vec![188.01, 189.71, 189.69]);
    }

    #[test]
    fn test_aggregate_response_without_results() {
        let body = r#"{"ticker": "ZZZZ", "status": "OK", "resultsCount": 0}"#;
        let resp: AggregateResponse = serde_json::from_str(body).unwrap();
        assert!(resp.into_closes().is_empty());
    }

    #[test]
    fn test_check_history_rejects_empty_and_short() {
        let request = HistoryRequest::for_window(3, 30, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());

        assert!(matches!(
            check_history("AAPL", vec![], &request),
            Err(MonitorError::DataUnavailable(_))
        ));
        assert!(matches!(
            check_history("AAPL", vec![1.0, 2.0, 3.0], &request),
            Err(MonitorError::DataUnavailable(_))
        ));
        assert_eq!(
            check_history("AAPL", vec![1.0, 2.0, 3.0, 4.0], &request).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_date_range_ends_on_as_of() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let (from, to) = date_range(&HistoryRequest::for_window(200, 400, as_of));
        assert_eq!(to, as_of);
        assert_eq!(from, NaiveDate::from_ymd_opt(2023, 2, 2).unwrap());
    }

    #[test]
    fn test_polygon_error_maps_to_data_unavailable() {
        let err: MonitorError = PolygonError::RateLimited.into();
        assert!(matches!(err, MonitorError::DataUnavailable(ref msg) if msg.contains("429")));
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let client = PolygonClient::new("key".into(), 5, Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_new_builds_client_with_timeout() {
        let client = PolygonClient::new("key".into(), 5, Duration::from_millis(1));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_slot() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    #[ignore] // Only run with a valid POLYGON_API_KEY
    async fn test_fetch_history_live() {
        let api_key = std::env::var("POLYGON_API_KEY").unwrap();
        let client = PolygonClient::new(api_key, 5, Duration::from_secs(30)).unwrap();
        let today = chrono::Local::now().date_naive();

        let closes = client
            .fetch_history("AAPL", &HistoryRequest::for_window(200, 400, today))
            .await
            .unwrap();

        println!("Fetched {} closes, last {:?}", closes.len(), closes.last());
        assert!(closes.len() >= 201);
    }
}
