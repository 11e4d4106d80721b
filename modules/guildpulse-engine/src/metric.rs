//! Metric vocabulary: the four kinds, the time window, and the series output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use guildpulse_events::{ActionKind, RowShape};
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// The fixed set of series this engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Member-count snapshots. Each row is already a total.
    UsersCurrentCount,
    UsersJoined,
    UsersLeft,
    MessagesCreated,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::UsersCurrentCount,
        MetricKind::UsersJoined,
        MetricKind::UsersLeft,
        MetricKind::MessagesCreated,
    ];

    /// The inbound token a dashboard query uses to select this kind.
    pub fn token(self) -> &'static str {
        match self {
            MetricKind::UsersCurrentCount => "numusers",
            MetricKind::UsersJoined => "numjoined",
            MetricKind::UsersLeft => "numleft",
            MetricKind::MessagesCreated => "nummessages",
        }
    }

    /// Series title shown by the dashboard.
    pub fn title(self) -> &'static str {
        match self {
            MetricKind::UsersCurrentCount => "no-users",
            MetricKind::UsersJoined => "no-joins",
            MetricKind::UsersLeft => "no-left",
            MetricKind::MessagesCreated => "no-messages",
        }
    }

    pub fn shape(self) -> RowShape {
        match self {
            MetricKind::UsersCurrentCount => RowShape::Raw,
            MetricKind::UsersJoined | MetricKind::UsersLeft | MetricKind::MessagesCreated => {
                RowShape::MinuteBucketed
            }
        }
    }

    /// The logged action this metric reads.
    pub fn action(self) -> ActionKind {
        match self {
            MetricKind::UsersCurrentCount => ActionKind::MembersInGuildCount,
            MetricKind::UsersJoined => ActionKind::UserJoinedGuild,
            MetricKind::UsersLeft => ActionKind::UserLeftGuild,
            MetricKind::MessagesCreated => ActionKind::MessageCreated,
        }
    }
}

impl FromStr for MetricKind {
    type Err = MetricsError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.token() == token)
            .ok_or_else(|| MetricsError::UnsupportedMetric(token.to_string()))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Inclusive `[from, to]` range in UTC. Ordering is checked by the query
/// builder, not here, so a bad window can still be reported back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new<Tz: TimeZone>(from: DateTime<Tz>, to: DateTime<Tz>) -> Self {
        Self {
            from: from.with_timezone(&Utc),
            to: to.with_timezone(&Utc),
        }
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.from > self.to {
            return Err(MetricsError::InvalidRequest(format!(
                "window starts after it ends ({self})"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.to.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub count: i64,
}

/// A titled, time-ordered series. Built fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub title: String,
    pub points: Vec<SeriesPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn every_token_parses_back_to_its_kind() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.token().parse::<MetricKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_token_is_unsupported() {
        let err = "numreactions".parse::<MetricKind>().unwrap_err();
        assert!(matches!(err, MetricsError::UnsupportedMetric(t) if t == "numreactions"));
    }

    #[test]
    fn empty_token_is_unsupported() {
        assert!(matches!(
            "".parse::<MetricKind>(),
            Err(MetricsError::UnsupportedMetric(_))
        ));
    }

    #[test]
    fn only_member_count_is_raw() {
        for kind in MetricKind::ALL {
            let expected = if kind == MetricKind::UsersCurrentCount {
                RowShape::Raw
            } else {
                RowShape::MinuteBucketed
            };
            assert_eq!(kind.shape(), expected, "{kind}");
        }
    }

    #[test]
    fn titles_match_dashboard_names() {
        assert_eq!(MetricKind::MessagesCreated.title(), "no-messages");
        assert_eq!(MetricKind::UsersJoined.title(), "no-joins");
        assert_eq!(MetricKind::UsersLeft.title(), "no-left");
        assert_eq!(MetricKind::UsersCurrentCount.title(), "no-users");
    }

    #[test]
    fn window_is_normalized_to_utc() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let from = plus_two.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let to = plus_two.with_ymd_and_hms(2024, 1, 2, 13, 0, 0).unwrap();

        let window = TimeWindow::new(from, to);

        assert_eq!(window.from, Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
        assert_eq!(window.to, Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap());
    }

    #[test]
    fn equal_bounds_are_valid() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert!(TimeWindow::new(t, t).validate().is_ok());
    }

    #[test]
    fn reversed_window_is_invalid() {
        let from = Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert!(matches!(
            TimeWindow::new(from, to).validate(),
            Err(MetricsError::InvalidRequest(_))
        ));
    }
}
