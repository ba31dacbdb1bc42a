use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One span as read back from a trace log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service: String,
    pub name: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub status: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl SpanRecord {
    pub fn duration_ms(&self) -> i64 {
        (self.end_ts - self.start_ts).num_milliseconds().max(0)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.status == "ERROR"
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn duration_never_negative() {
        let start = Utc.with_ymd_and_hms(2022, 1, 22, 4, 45, 30).unwrap();
        let span = SpanRecord {
            trace_id: "t".into(),
            span_id: "s".into(),
            parent_span_id: None,
            service: "svc".into(),
            name: "n".into(),
            start_ts: start,
            end_ts: start - chrono::Duration::seconds(1),
            status: "OK".into(),
            attributes: BTreeMap::new(),
        };
        assert_eq!(span.duration_ms(), 0);
    }
}
