//! JSON rendering for batch responses.

use guildpulse_engine::MetricResponse;
use serde_json::{json, Value};

/// One object per response: `{refId, series}` on success, `{refId, error}` on failure.
pub fn batch_json(responses: &[MetricResponse]) -> Value {
    Value::Array(responses.iter().map(response_json).collect())
}

fn response_json(response: &MetricResponse) -> Value {
    match &response.result {
        Ok(series) => json!({
            "refId": response.ref_id,
            "series": series,
        }),
        Err(e) => json!({
            "refId": response.ref_id,
            "error": e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guildpulse_engine::{DispatchError, MetricsError, Series, SeriesPoint, TimeWindow};

    #[test]
    fn success_and_failure_render_side_by_side() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let responses = vec![
            MetricResponse {
                ref_id: "A".into(),
                result: Ok(Series {
                    title: "no-joins".into(),
                    points: vec![SeriesPoint { timestamp: t, count: 4 }],
                }),
            },
            MetricResponse {
                ref_id: "B".into(),
                result: Err(DispatchError::new(
                    "bogus",
                    TimeWindow::new(t, t),
                    MetricsError::UnsupportedMetric("bogus".into()),
                )),
            },
        ];

        let rendered = batch_json(&responses);

        assert_eq!(rendered[0]["refId"], "A");
        assert_eq!(rendered[0]["series"]["title"], "no-joins");
        assert_eq!(rendered[0]["series"]["points"][0]["count"], 4);
        assert_eq!(rendered[1]["refId"], "B");
        assert!(rendered[1]["error"].as_str().unwrap().contains("Unsupported metric"));
        assert!(rendered[1].get("series").is_none());
    }
}
