//! Metric query dispatch and time-series normalization.
//!
//! Turns `(metric, guild, window)` into a titled series: the builder picks one
//! of two fixed aggregations, a `MetricSource` runs it, and the normalizer
//! reshapes the rows into points.
//!
//! Snapshot metrics (member counts) come back row-for-row and are never
//! summed. Event metrics (joins, leaves, messages) are counted per UTC minute.

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod metric;
pub mod normalize;
pub mod source;

pub use dispatcher::{Dispatcher, HealthStatus, MetricRequest, MetricResponse, RetryPolicy};
pub use error::{DispatchError, MetricsError};
pub use metric::{MetricKind, Series, SeriesPoint, TimeWindow};
pub use source::{MemoryMetricSource, MetricSource};
