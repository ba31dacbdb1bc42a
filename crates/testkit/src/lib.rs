use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use junit_trace_core::model::span::SpanRecord;
use opentelemetry::Value;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

/// Single suite, two passing cases of 1s and 2s, no suite `time`.
pub const JUNIT_TESTSUITE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="Tests.Registration" tests="2" failures="0" errors="0" skipped="0"
           timestamp="2022-01-22T04:45:30" hostname="runner-1">
  <testcase name="testCase1" classname="Tests.Registration" time="1.0"/>
  <testcase name="testCase2" classname="Tests.Registration" time="2.0"/>
  <system-out>registration output</system-out>
</testsuite>
"#;

/// Two passing suites of two cases each.
pub const JUNIT_TESTSUITES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="Test run" tests="4" failures="0" errors="0" time="6.0">
  <testsuite name="Tests.Registration" tests="2" failures="0" errors="0"
             timestamp="2022-01-22T04:45:30">
    <testcase name="testCase1" classname="Tests.Registration" time="1.0"/>
    <testcase name="testCase2" classname="Tests.Registration" time="2.0"/>
  </testsuite>
  <testsuite name="Tests.Authentication" tests="2" failures="0" errors="0"
             timestamp="2022-01-22T04:45:33">
    <testcase name="testCase3" classname="Tests.Authentication" time="1.5"/>
    <testcase name="testCase4" classname="Tests.Authentication" time="1.5"/>
  </testsuite>
</testsuites>
"#;

/// A collection whose only suite reports an error and carries no cases.
pub const JUNIT_SUITE_ERRORS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="Broken run" tests="1" errors="1">
  <testsuite name="Tests.Setup" tests="1" failures="0" errors="1"
             timestamp="2022-01-22T04:45:30" time="0.5"/>
</testsuites>
"#;

/// One passing and one failing case.
pub const JUNIT_FAILING_CASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="Tests.Math" tests="2" failures="1" errors="0"
           timestamp="2022-01-22T04:45:30">
  <testcase name="adds" classname="Tests.Math" time="0.25"/>
  <testcase name="compares" classname="Tests.Math" time="0.75">
    <failure message="assert x==y" type="AssertionError">x was 1, y was 2</failure>
  </testcase>
</testsuite>
"#;

/// Layout produced by go-junit-report: properties, skipped cases, status-free cases.
pub const JUNIT_GOLANG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites tests="3" failures="0">
  <testsuite name="example.com/widgets/store" tests="3" failures="0" errors="0"
             id="0" package="example.com/widgets/store" skipped="1" time="0.012"
             timestamp="2022-01-22T04:45:30Z" hostname="runner-2">
    <properties>
      <property name="go.version" value="go1.22.1"/>
    </properties>
    <testcase name="TestPut" classname="example.com/widgets/store" time="0.004"/>
    <testcase name="TestGet" classname="example.com/widgets/store" time="0.008"/>
    <testcase name="TestSlow" classname="example.com/widgets/store" time="0.000">
      <skipped message="skipping in short mode"/>
    </testcase>
  </testsuite>
</testsuites>
"#;

pub fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 22, 4, 45, 30).unwrap()
}

/// Provider that records every finished span in memory.
pub fn in_memory_provider() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

pub fn attr<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn span_named<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
    spans
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no span named {name}"))
}

/// A root with one passing suite and one failing case, as read back from a trace log.
pub fn sample_records(trace_id: &str) -> Vec<SpanRecord> {
    let base = run_start();
    let record = |span_id: &str, parent: Option<&str>, name: &str, end_ms: i64, status: &str| {
        let mut attributes = BTreeMap::new();
        attributes.insert("test.name".to_string(), name.into());
        SpanRecord {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            parent_span_id: parent.map(str::to_string),
            service: "CI".to_string(),
            name: name.to_string(),
            start_ts: base,
            end_ts: base + Duration::milliseconds(end_ms),
            status: status.to_string(),
            attributes,
        }
    };

    vec![
        record("root", None, "Junit Test Runs", 1000, "ERROR"),
        record("suite", Some("root"), "Tests.Math", 1000, "ERROR"),
        record("case-a", Some("suite"), "adds", 250, "OK"),
        record("case-b", Some("suite"), "compares", 1000, "ERROR"),
    ]
}
