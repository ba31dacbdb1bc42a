use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use junit_trace_tracer::attributes::{ERROR, SCOPE_RUN, TEST_SCOPE, TEST_SOURCE};
use junit_trace_tracer::{Outcome, ROOT_SPAN_NAME, TraceJunitParams, trace_junit_artifact};
use opentelemetry::trace::{SpanId, Status, TracerProvider};
use opentelemetry::{Context, Value};
use opentelemetry_sdk::trace::SpanData;
use testkit::{attr, in_memory_provider, run_start, span_named};

async fn run(pattern: &str) -> (junit_trace_core::Result<junit_trace_tracer::Traced>, Vec<SpanData>) {
    let (provider, exporter) = in_memory_provider();
    let tracer = provider.tracer("test");
    let result = trace_junit_artifact(TraceJunitParams {
        tracer: &tracer,
        start_time: run_start(),
        path: pattern,
        base_html_url: Some("https://github.com/acme/widgets/actions/runs/1/job/2"),
        parent: &Context::new(),
    })
    .await;
    (result, exporter.get_finished_spans().unwrap())
}

fn write(dir: &Path, name: &str, xml: &str) {
    fs::write(dir.join(name), xml).unwrap();
}

fn pattern(dir: &Path, glob: &str) -> String {
    format!("{}/{glob}", glob::Pattern::escape(&dir.to_string_lossy()))
}

fn roots(spans: &[SpanData]) -> Vec<&SpanData> {
    spans
        .iter()
        .filter(|s| s.parent_span_id == SpanId::INVALID)
        .collect()
}

fn start_plus(secs: u64) -> SystemTime {
    SystemTime::from(run_start()) + Duration::from_secs(secs)
}

#[tokio::test]
async fn single_suite_report_produces_root_suite_and_cases() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "report.xml", testkit::JUNIT_TESTSUITE);

    let (result, spans) = run(&pattern(temp.path(), "*.xml")).await;
    let traced = result.unwrap();

    assert_eq!(traced.status, Outcome::Ok);
    assert_eq!(traced.duration_secs, 3.0);
    assert_eq!(spans.len(), 4);

    let root = span_named(&spans, ROOT_SPAN_NAME);
    assert_eq!(roots(&spans).len(), 1);
    assert_eq!(attr(root, TEST_SOURCE), Some(&Value::from("junit")));
    assert_eq!(attr(root, TEST_SCOPE), Some(&Value::from(SCOPE_RUN)));
    assert_eq!(root.end_time, start_plus(3));

    let suite = span_named(&spans, "Tests.Registration");
    assert_eq!(suite.parent_span_id, root.span_context.span_id());
    assert_eq!(suite.end_time, start_plus(3));
    assert_eq!(
        attr(suite, "test.html_url"),
        Some(&Value::from(
            "https://github.com/acme/widgets/actions/runs/1/job/2/Tests.Registration"
        ))
    );
    for span in &spans {
        assert_eq!(span.status, Status::Ok, "{}", span.name);
        assert_eq!(attr(span, ERROR), Some(&Value::Bool(false)));
        assert!(span.end_time >= span.start_time);
    }
}

#[tokio::test]
async fn glob_over_several_files_shares_one_root() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "a_suite.xml", testkit::JUNIT_TESTSUITE);
    write(temp.path(), "b_suites.xml", testkit::JUNIT_TESTSUITES);
    write(temp.path(), "c_failing.xml", testkit::JUNIT_FAILING_CASE);

    let (result, spans) = run(&pattern(temp.path(), "*.xml")).await;
    let traced = result.unwrap();

    // 1 root + 3 + 7 + 3
    assert_eq!(spans.len(), 14);
    let root = roots(&spans);
    assert_eq!(root.len(), 1);
    let root = root[0];
    assert_eq!(root.name, ROOT_SPAN_NAME);

    let file_spans = spans
        .iter()
        .filter(|s| s.parent_span_id == root.span_context.span_id())
        .count();
    assert_eq!(file_spans, 3);

    // the collection sums its two suites, 3s each
    assert_eq!(traced.duration_secs, 6.0);
    assert_eq!(root.end_time, start_plus(6));
    assert_eq!(traced.status, Outcome::Error);
    assert!(matches!(root.status, Status::Error { .. }));
    assert_eq!(span_named(&spans, "Test run").status, Status::Ok);
}

#[tokio::test]
async fn failing_case_carries_failure_attributes() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "math.xml", testkit::JUNIT_FAILING_CASE);

    let (result, spans) = run(&pattern(temp.path(), "math.xml")).await;
    assert_eq!(result.unwrap().status, Outcome::Error);

    let case = span_named(&spans, "compares");
    assert_eq!(attr(case, "test.failure.0.message"), Some(&Value::from("assert x==y")));
    assert_eq!(attr(case, "test.failure.0.type"), Some(&Value::from("AssertionError")));
    assert_eq!(attr(case, "test.failure.0.inner"), Some(&Value::from("x was 1, y was 2")));
    assert!(matches!(case.status, Status::Error { .. }));
    for name in ["Tests.Math", ROOT_SPAN_NAME] {
        assert!(matches!(span_named(&spans, name).status, Status::Error { .. }));
    }
    assert_eq!(span_named(&spans, "adds").status, Status::Ok);
}

#[tokio::test]
async fn no_matching_files_still_emits_closed_root() {
    let temp = tempfile::tempdir().unwrap();

    let (result, spans) = run(&pattern(temp.path(), "*.xml")).await;
    let traced = result.unwrap();

    assert_eq!(traced.duration_secs, 0.0);
    assert_eq!(traced.status, Outcome::Ok);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].start_time, spans[0].end_time);
    assert_eq!(spans[0].status, Status::Ok);
}

#[tokio::test]
async fn parse_error_aborts_but_closes_root() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "a.xml", testkit::JUNIT_TESTSUITE);
    write(temp.path(), "b.xml", "<testsuite name=\"cut\"><testcase name=\"x\">");
    write(temp.path(), "c.xml", testkit::JUNIT_TESTSUITES);

    let (result, spans) = run(&pattern(temp.path(), "*.xml")).await;
    let err = result.unwrap_err().to_string();
    assert!(err.contains("b.xml"), "{err}");

    // root plus the first file only
    assert_eq!(spans.len(), 4);
    let root = span_named(&spans, ROOT_SPAN_NAME);
    assert_eq!(root.end_time, start_plus(3));
    assert_eq!(root.status, Status::Ok);
}

#[tokio::test]
async fn rerun_over_same_reports_is_identical_apart_from_ids() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "go.xml", testkit::JUNIT_GOLANG);
    write(temp.path(), "suites.xml", testkit::JUNIT_TESTSUITES);
    let glob = pattern(temp.path(), "*.xml");

    let shape = |spans: Vec<SpanData>| {
        spans
            .into_iter()
            .map(|s| (s.name, s.start_time, s.end_time, s.status, s.attributes))
            .collect::<Vec<_>>()
    };
    let (first, first_spans) = run(&glob).await;
    let (second, second_spans) = run(&glob).await;

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(shape(first_spans), shape(second_spans));
}

#[tokio::test]
async fn golang_report_keeps_skip_messages() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "go.xml", testkit::JUNIT_GOLANG);

    let (result, spans) = run(&pattern(temp.path(), "go.xml")).await;
    assert_eq!(result.unwrap().status, Outcome::Ok);

    let slow = span_named(&spans, "TestSlow");
    assert_eq!(
        attr(slow, "test.skipped.0.message"),
        Some(&Value::from("skipping in short mode"))
    );
    let suite = span_named(&spans, "example.com/widgets/store");
    assert_eq!(attr(suite, "test.skipped"), Some(&Value::I64(1)));
    assert_eq!(attr(suite, "test.package"), Some(&Value::from("example.com/widgets/store")));
    assert_eq!(
        suite.end_time.duration_since(suite.start_time).unwrap(),
        Duration::from_millis(12)
    );
}
