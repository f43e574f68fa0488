use async_trait::async_trait;

use crate::{HistoryRequest, MonitorError};

/// Source of trailing daily closing prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Daily closes for `symbol`, oldest first.
    ///
    /// Fails with [`MonitorError::DataUnavailable`] when the upstream errors,
    /// returns nothing, or returns fewer than `request.min_points` closes.
    async fn fetch_history(
        &self,
        symbol: &str,
        request: &HistoryRequest,
    ) -> Result<Vec<f64>, MonitorError>;

    fn name(&self) -> &str;
}

/// Single-destination text message sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Fails with [`MonitorError::Unreachable`].
    async fn send(&self, message: &str) -> Result<(), MonitorError>;

    fn name(&self) -> &str;
}
