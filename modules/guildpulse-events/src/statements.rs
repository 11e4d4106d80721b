//! The two aggregation statements the gateway serves.
//!
//! Both take the same positional parameters: `$1` guild id, `$2` action code,
//! `$3`/`$4` inclusive window bounds.

/// Snapshot rows as stored, newest first. Never aggregated.
pub const RAW_SNAPSHOT_SQL: &str = r#"
    SELECT ts, value AS count
    FROM actions
    WHERE guild_id = $1 AND action = $2 AND ts BETWEEN $3 AND $4
    ORDER BY ts DESC
"#;

/// Event counts grouped by the UTC minute they fall in, oldest first.
/// Labels render as `YYYY-MM-DD HH24:MI`.
pub const MINUTE_BUCKET_SQL: &str = r#"
    SELECT to_char(ts AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI') AS bucket, COUNT(*) AS count
    FROM actions
    WHERE guild_id = $1 AND action = $2 AND ts BETWEEN $3 AND $4
    GROUP BY 1
    ORDER BY 1 ASC
"#;
