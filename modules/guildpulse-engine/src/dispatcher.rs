//! Metric dispatch: build → execute → normalize → title.
//!
//! Each call is one atomic attempt from the caller's point of view: it either
//! returns a complete `Series` or a `DispatchError`. Unavailable stores are
//! retried internally according to `RetryPolicy`; nothing else is.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use guildpulse_events::{QuerySpec, RawRow};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builder;
use crate::error::{DispatchError, MetricsError};
use crate::metric::{MetricKind, Series, TimeWindow};
use crate::normalize;
use crate::source::MetricSource;

/// How many extra attempts an unavailable store gets, and how long to wait
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// One inbound query from the dashboard host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRequest {
    pub ref_id: String,
    pub metric: String,
    pub scope: String,
    pub window: TimeWindow,
    /// Advisory only; the bucket size is fixed.
    #[serde(default)]
    pub max_data_points: Option<u32>,
}

#[derive(Debug)]
pub struct MetricResponse {
    pub ref_id: String,
    pub result: Result<Series, DispatchError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    source: Arc<dyn MetricSource>,
    retry: RetryPolicy,
    query_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
            query_timeout: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound every store round trip. When the deadline elapses the query is
    /// cancelled through its token and surfaces as `Cancelled`.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Produce the series for `kind` over `scope` and `window`.
    pub async fn dispatch(
        &self,
        kind: MetricKind,
        scope: &str,
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Series, DispatchError> {
        self.run(kind, scope, &window, cancel)
            .await
            .map_err(|e| DispatchError::new(kind.token(), window, e))
    }

    /// Same as [`dispatch`](Self::dispatch) for an inbound metric token.
    pub async fn dispatch_token(
        &self,
        token: &str,
        scope: &str,
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Series, DispatchError> {
        let kind: MetricKind = token.parse().map_err(|e| {
            warn!(metric = token, "Rejected unsupported metric");
            DispatchError::new(token, window, e)
        })?;
        self.dispatch(kind, scope, window, cancel).await
    }

    /// Run every request concurrently. One response per request, in order;
    /// a failing request does not affect the others.
    pub async fn dispatch_all(
        &self,
        requests: Vec<MetricRequest>,
        cancel: &CancellationToken,
    ) -> Vec<MetricResponse> {
        let pending = requests.into_iter().map(|request| async move {
            if let Some(points) = request.max_data_points {
                debug!(ref_id = %request.ref_id, max_data_points = points, "Ignoring point-count hint");
            }
            let result = self
                .dispatch_token(&request.metric, &request.scope, request.window, cancel)
                .await;
            MetricResponse {
                ref_id: request.ref_id,
                result,
            }
        });

        join_all(pending).await
    }

    /// Probe the store. Never fails; reports the outcome instead.
    pub async fn check_health(&self) -> HealthStatus {
        match self.source.ping().await {
            Ok(()) => HealthStatus {
                ok: true,
                message: "Data source is working".to_string(),
            },
            Err(e) => {
                error!(error = %e, "Health check failed");
                HealthStatus {
                    ok: false,
                    message: "Unable to reach the event store".to_string(),
                }
            }
        }
    }

    async fn run(
        &self,
        kind: MetricKind,
        scope: &str,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Series, MetricsError> {
        let spec = builder::build(kind, scope, window)?;
        let rows = self.execute_with_retry(&spec, cancel).await?;
        let row_count = rows.len();
        let points = normalize::normalize(rows, spec.shape())?;

        debug!(metric = kind.token(), scope, "Dispatched for scope");
        info!(
            metric = kind.token(),
            window = %window,
            rows = row_count,
            "Metric dispatched"
        );

        Ok(Series {
            title: kind.title().to_string(),
            points,
        })
    }

    async fn execute_with_retry(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRow>, MetricsError> {
        let mut attempt = 0;
        loop {
            match self.execute_once(spec, cancel).await {
                Err(MetricsError::StoreUnavailable(reason)) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        reason = %reason,
                        "Event store unavailable, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(MetricsError::Cancelled),
                        _ = tokio::time::sleep(self.retry.backoff) => {}
                    }
                }
                outcome => return outcome,
            }
        }
    }

    async fn execute_once(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRow>, MetricsError> {
        let Some(limit) = self.query_timeout else {
            return Ok(self.source.execute(spec, cancel).await?);
        };

        // The deadline cancels through the token so the source can stop the
        // statement on the server, rather than just dropping the future.
        let query_cancel = cancel.child_token();
        let deadline = tokio::spawn({
            let query_cancel = query_cancel.clone();
            async move {
                tokio::time::sleep(limit).await;
                warn!(timeout_ms = limit.as_millis() as u64, "Query deadline elapsed");
                query_cancel.cancel();
            }
        });

        let outcome = self.source.execute(spec, &query_cancel).await;
        deadline.abort();
        Ok(outcome?)
    }
}
