use guildpulse_events::StoreError;
use thiserror::Error;

use crate::metric::TimeWindow;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Event store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Row decode failed: {0}")]
    RowDecodeFailed(String),

    #[error("Malformed bucket label: {label:?}")]
    MalformedBucketLabel { label: String },

    #[error("Unsupported metric: {0:?}")]
    UnsupportedMetric(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<StoreError> for MetricsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => MetricsError::StoreUnavailable(msg),
            StoreError::QueryFailed(msg) => MetricsError::QueryFailed(msg),
            StoreError::RowDecode(msg) => MetricsError::RowDecodeFailed(msg),
            StoreError::Cancelled => MetricsError::Cancelled,
        }
    }
}

/// A failed dispatch, carrying the metric token and window that were asked for.
#[derive(Debug, Error)]
#[error("{metric} over {window}: {error}")]
pub struct DispatchError {
    pub metric: String,
    pub window: TimeWindow,
    #[source]
    pub error: MetricsError,
}

impl DispatchError {
    pub fn new(metric: impl Into<String>, window: TimeWindow, error: MetricsError) -> Self {
        Self {
            metric: metric.into(),
            window,
            error,
        }
    }

    pub fn kind(&self) -> &MetricsError {
        &self.error
    }
}
