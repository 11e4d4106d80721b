//! Turns gateway rows into series points.

use chrono::NaiveDateTime;
use guildpulse_events::{RawRow, RowShape};

use crate::error::MetricsError;
use crate::metric::SeriesPoint;

/// Minute-resolution label rendered by the bucketed query, read as UTC.
pub const BUCKET_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Convert `rows` into points without reordering them.
///
/// All-or-nothing: one bad row fails the whole batch.
pub fn normalize(rows: Vec<RawRow>, shape: RowShape) -> Result<Vec<SeriesPoint>, MetricsError> {
    rows.into_iter().map(|row| to_point(row, shape)).collect()
}

fn to_point(row: RawRow, shape: RowShape) -> Result<SeriesPoint, MetricsError> {
    match (shape, row) {
        (RowShape::Raw, RawRow::Snapshot { timestamp, count }) => Ok(SeriesPoint { timestamp, count }),
        (RowShape::MinuteBucketed, RawRow::Bucketed { label, count }) => Ok(SeriesPoint {
            timestamp: parse_bucket_label(&label)?,
            count,
        }),
        (RowShape::Raw, RawRow::Bucketed { .. }) => Err(MetricsError::RowDecodeFailed(
            "bucketed row in a raw result".to_string(),
        )),
        (RowShape::MinuteBucketed, RawRow::Snapshot { .. }) => Err(MetricsError::RowDecodeFailed(
            "snapshot row in a bucketed result".to_string(),
        )),
    }
}

pub fn parse_bucket_label(label: &str) -> Result<chrono::DateTime<chrono::Utc>, MetricsError> {
    NaiveDateTime::parse_from_str(label, BUCKET_LABEL_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| MetricsError::MalformedBucketLabel {
            label: label.to_string(),
        })
}

/// True when timestamps never decrease. Ties are allowed.
pub fn is_ascending(points: &[SeriesPoint]) -> bool {
    points.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bucket(label: &str, count: i64) -> RawRow {
        RawRow::Bucketed {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn bucket_labels_become_minute_timestamps() {
        let points = normalize(
            vec![bucket("2024-01-02 10:00", 3), bucket("2024-01-02 10:01", 5)],
            RowShape::MinuteBucketed,
        )
        .unwrap();

        assert_eq!(
            points,
            vec![
                SeriesPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
                    count: 3
                },
                SeriesPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, 1, 0).unwrap(),
                    count: 5
                },
            ]
        );
        assert!(is_ascending(&points));
    }

    #[test]
    fn one_bad_label_fails_everything() {
        let err = normalize(
            vec![bucket("2024-01-02 10:00", 3), bucket("not-a-time", 1)],
            RowShape::MinuteBucketed,
        )
        .unwrap_err();

        assert!(matches!(err, MetricsError::MalformedBucketLabel { label } if label == "not-a-time"));
    }

    #[test]
    fn labels_with_seconds_are_rejected() {
        // Only the exact minute format is accepted.
        assert!(parse_bucket_label("2024-01-02 10:00:30").is_err());
        assert!(parse_bucket_label("2024-01-02T10:00").is_err());
        assert!(parse_bucket_label("").is_err());
    }

    #[test]
    fn snapshots_pass_through_in_store_order() {
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 10, 5, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let rows = vec![
            RawRow::Snapshot { timestamp: later, count: 140 },
            RawRow::Snapshot { timestamp: earlier, count: 138 },
        ];

        let points = normalize(rows, RowShape::Raw).unwrap();

        assert_eq!(points[0], SeriesPoint { timestamp: later, count: 140 });
        assert_eq!(points[1], SeriesPoint { timestamp: earlier, count: 138 });
    }

    #[test]
    fn mismatched_row_variant_is_decode_failure() {
        let err = normalize(vec![bucket("2024-01-02 10:00", 1)], RowShape::Raw).unwrap_err();
        assert!(matches!(err, MetricsError::RowDecodeFailed(_)));

        let snapshot = RawRow::Snapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            count: 1,
        };
        let err = normalize(vec![snapshot], RowShape::MinuteBucketed).unwrap_err();
        assert!(matches!(err, MetricsError::RowDecodeFailed(_)));
    }

    #[test]
    fn empty_rows_make_empty_points() {
        assert!(normalize(vec![], RowShape::MinuteBucketed).unwrap().is_empty());
        assert!(normalize(vec![], RowShape::Raw).unwrap().is_empty());
    }

    #[test]
    fn ascending_check_allows_ties_and_rejects_inversions() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 10, 1, 0).unwrap();
        let p = |timestamp| SeriesPoint { timestamp, count: 1 };

        assert!(is_ascending(&[]));
        assert!(is_ascending(&[p(t0), p(t0), p(t1)]));
        assert!(!is_ascending(&[p(t1), p(t0)]));
    }
}
