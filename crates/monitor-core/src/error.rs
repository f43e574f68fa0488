use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Upstream fetch failed or returned too little history. The symbol is
    /// skipped for the current cycle.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// The notification channel did not accept the message.
    #[error("Notifier unreachable: {0}")]
    Unreachable(String),
}
