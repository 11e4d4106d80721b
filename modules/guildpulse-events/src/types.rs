//! Core types for the event log gateway. Metric-agnostic.

use chrono::{DateTime, Utc};

/// Action codes as stored in the `actions.action` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    UserJoinedGuild,
    UserLeftGuild,
    MessageCreated,
    /// Periodic snapshot of the guild's member count; `value` holds the count.
    MembersInGuildCount,
}

impl ActionKind {
    pub fn code(self) -> i16 {
        match self {
            ActionKind::UserJoinedGuild => 1,
            ActionKind::UserLeftGuild => 2,
            ActionKind::MessageCreated => 3,
            ActionKind::MembersInGuildCount => 4,
        }
    }
}

/// Which row shape a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// `(timestamp, count)` rows returned as stored.
    Raw,
    /// `(minute label, count)` rows grouped by the store.
    MinuteBucketed,
}

/// A value bound to a positional placeholder at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    SmallInt(i16),
    Timestamp(DateTime<Utc>),
}

/// An executable aggregation: fixed statement text plus bound parameters.
///
/// The gateway runs it without knowing which metric asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    shape: RowShape,
    statement: &'static str,
    params: Vec<QueryParam>,
}

impl QuerySpec {
    pub fn new(shape: RowShape, statement: &'static str, params: Vec<QueryParam>) -> Self {
        Self {
            shape,
            statement,
            params,
        }
    }

    pub fn shape(&self) -> RowShape {
        self.shape
    }

    pub fn statement(&self) -> &'static str {
        self.statement
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

/// One decoded result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRow {
    /// A standalone count at a point in time. Never summed with its neighbours.
    Snapshot { timestamp: DateTime<Utc>, count: i64 },
    /// A store-side group keyed by a text label such as `2024-01-02 15:04`.
    Bucketed { label: String, count: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_are_distinct() {
        let codes: Vec<i16> = [
            ActionKind::UserJoinedGuild,
            ActionKind::UserLeftGuild,
            ActionKind::MessageCreated,
            ActionKind::MembersInGuildCount,
        ]
        .into_iter()
        .map(ActionKind::code)
        .collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn query_spec_keeps_params_in_order() {
        let spec = QuerySpec::new(
            RowShape::Raw,
            "SELECT 1",
            vec![QueryParam::Text("g".into()), QueryParam::SmallInt(4)],
        );
        assert_eq!(spec.shape(), RowShape::Raw);
        assert_eq!(spec.params()[0], QueryParam::Text("g".into()));
        assert_eq!(spec.params()[1], QueryParam::SmallInt(4));
    }
}
