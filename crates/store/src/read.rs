use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use junit_trace_core::error::{JunitTraceError, Result};
use junit_trace_core::model::span::SpanRecord;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

/// Reads every span of a trace log in file order.
pub fn read_trace_log(path: impl AsRef<Path>) -> Result<Vec<SpanRecord>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| JunitTraceError::Io(format!("failed reading {}: {e}", path.display())))?;

    let mut spans = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let decoded = decode_line(line).map_err(|e| {
            JunitTraceError::Parse(format!("{} line {}: {e}", path.display(), idx + 1))
        })?;
        spans.extend(decoded);
    }
    Ok(spans)
}

pub fn decode_line(line: &str) -> std::result::Result<Vec<SpanRecord>, serde_json::Error> {
    let request: ExportTraceServiceRequest = serde_json::from_str(line)?;
    let mut spans = Vec::new();
    for resource_spans in &request.resource_spans {
        let service = service_name(resource_spans.resource.as_ref());
        for scope_spans in &resource_spans.scope_spans {
            spans.extend(
                scope_spans
                    .spans
                    .iter()
                    .map(|span| decode_span(&service, span)),
            );
        }
    }
    Ok(spans)
}

fn decode_span(service: &str, span: &OtlpSpan) -> SpanRecord {
    let code = span.status.as_ref().map(|s| s.code).unwrap_or_default();
    let status = if code == StatusCode::Error as i32 {
        "ERROR"
    } else {
        "OK"
    };

    SpanRecord {
        trace_id: bytes_to_hex(&span.trace_id).unwrap_or_default(),
        span_id: bytes_to_hex(&span.span_id).unwrap_or_default(),
        parent_span_id: bytes_to_hex(&span.parent_span_id),
        service: service.to_string(),
        name: span.name.clone(),
        start_ts: nanos_to_dt(span.start_time_unix_nano),
        end_ts: nanos_to_dt(span.end_time_unix_nano),
        status: status.to_string(),
        attributes: span
            .attributes
            .iter()
            .map(|kv| (kv.key.clone(), any_value_to_json(kv.value.as_ref())))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn service_name(resource: Option<&Resource>) -> String {
    resource
        .and_then(|r| find_string(&r.attributes, "service.name"))
        .unwrap_or_else(|| "unknown".to_string())
}

fn find_string(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| match kv.value.as_ref()?.value.as_ref()? {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        })
}

fn any_value_to_json(value: Option<&AnyValue>) -> serde_json::Value {
    match value.and_then(|v| v.value.as_ref()) {
        Some(Value::StringValue(s)) => serde_json::Value::from(s.as_str()),
        Some(Value::BoolValue(b)) => serde_json::Value::from(*b),
        Some(Value::IntValue(i)) => serde_json::Value::from(*i),
        Some(Value::DoubleValue(d)) => serde_json::Value::from(*d),
        Some(Value::ArrayValue(a)) => a
            .values
            .iter()
            .map(|v| any_value_to_json(Some(v)))
            .collect(),
        Some(Value::KvlistValue(kv)) => serde_json::Value::Object(
            kv.values
                .iter()
                .map(|kv| (kv.key.clone(), any_value_to_json(kv.value.as_ref())))
                .collect(),
        ),
        Some(Value::BytesValue(b)) => bytes_to_hex(b).into(),
        None => serde_json::Value::Null,
    }
}

fn bytes_to_hex(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

fn nanos_to_dt(nanos: u64) -> DateTime<Utc> {
    let secs = (nanos / 1_000_000_000) as i64;
    let subnanos = (nanos % 1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subnanos)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"resourceSpans":[{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"CI"}}]},"scopeSpans":[{"scope":{"name":"junit-trace"},"spans":[{"traceId":"0af7651916cd43dd8448eb211c80319c","spanId":"b7ad6b7169203331","parentSpanId":"00f067aa0ba902b7","name":"testCase1","kind":1,"startTimeUnixNano":"1642826730000000000","endTimeUnixNano":"1642826731000000000","attributes":[{"key":"test.time","value":{"doubleValue":1.0}},{"key":"test.tests","value":{"intValue":"2"}},{"key":"test.scope","value":{"stringValue":"Case"}}],"status":{"code":1}}]}]}]}"#;

    #[test]
    fn decodes_spans_with_service_and_attributes() {
        let spans = decode_line(LINE).unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.service, "CI");
        assert_eq!(span.parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
        assert_eq!(span.status, "OK");
        assert_eq!(span.duration_ms(), 1000);
        assert_eq!(span.attr_str("test.scope"), Some("Case"));
        assert_eq!(span.attributes["test.time"], serde_json::json!(1.0));
        assert_eq!(span.attributes["test.tests"], serde_json::json!(2));
    }

    #[test]
    fn root_span_has_no_parent_and_error_code_maps_to_error() {
        let line = LINE
            .replace(r#""parentSpanId":"00f067aa0ba902b7","#, r#""parentSpanId":"","#)
            .replace(r#""status":{"code":1}"#, r#""status":{"code":2,"message":"boom"}"#);
        let spans = decode_line(&line).unwrap();
        assert!(spans[0].parent_span_id.is_none());
        assert!(spans[0].is_error());
    }

    #[test]
    fn skips_blank_lines_and_reports_bad_line_number() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("trace.log");
        fs::write(&path, format!("{LINE}\n\n{LINE}\n")).unwrap();
        assert_eq!(read_trace_log(&path).unwrap().len(), 2);

        fs::write(&path, format!("{LINE}\nnot json\n")).unwrap();
        let err = read_trace_log(&path).unwrap_err().to_string();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn missing_log_is_io_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_trace_log(temp.path().join("absent.log")),
            Err(JunitTraceError::Io(_))
        ));
    }
}
