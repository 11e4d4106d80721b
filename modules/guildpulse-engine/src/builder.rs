//! Maps a metric request onto one of two fixed aggregation statements.
//!
//! Statement text never changes between requests. Scope, action code and
//! window bounds are always positional parameters.

use guildpulse_events::{QueryParam, QuerySpec, RowShape, MINUTE_BUCKET_SQL, RAW_SNAPSHOT_SQL};

use crate::error::MetricsError;
use crate::metric::{MetricKind, TimeWindow};

/// Build the query for `kind` over `scope` and `window`. Pure.
///
/// Bucket labels are read back with [`crate::normalize::BUCKET_LABEL_FORMAT`].
pub fn build(kind: MetricKind, scope: &str, window: &TimeWindow) -> Result<QuerySpec, MetricsError> {
    let scope = scope.trim();
    if scope.is_empty() {
        return Err(MetricsError::InvalidRequest("scope is empty".to_string()));
    }
    window.validate()?;

    let statement = match kind.shape() {
        RowShape::Raw => RAW_SNAPSHOT_SQL,
        RowShape::MinuteBucketed => MINUTE_BUCKET_SQL,
    };

    Ok(QuerySpec::new(
        kind.shape(),
        statement,
        vec![
            QueryParam::Text(scope.to_string()),
            QueryParam::SmallInt(kind.action().code()),
            QueryParam::Timestamp(window.from),
            QueryParam::Timestamp(window.to),
        ],
    ))
}
