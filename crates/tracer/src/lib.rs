pub mod attributes;
pub mod builder;
pub mod provider;
pub mod scope;

use chrono::{DateTime, Utc};
use junit_trace_core::error::{JunitTraceError, Result};
use junit_trace_report::{ReportLocator, parse_document};
use opentelemetry::trace::Tracer;
use opentelemetry::{Context, KeyValue};
use tracing::debug;

pub use builder::SpanTreeBuilder;
pub use provider::{TRACER_NAME, TracerProviderParams, create_tracer_provider};
pub use scope::{Outcome, Traced};

use crate::attributes::{SCOPE_RUN, SOURCE_JUNIT, TEST_SCOPE, TEST_SOURCE};
use crate::scope::SpanScope;

pub const ROOT_SPAN_NAME: &str = "Junit Test Runs";

pub struct TraceJunitParams<'a, T> {
    pub tracer: &'a T,
    pub start_time: DateTime<Utc>,
    /// Report path or glob; several patterns may be given one per line.
    pub path: &'a str,
    pub base_html_url: Option<&'a str>,
    pub parent: &'a Context,
}

/// Traces every report matched by `path` under a single "Junit Test Runs" root span.
///
/// Report files become siblings under the root, which lasts as long as the longest
/// file. A read or parse failure stops the run; the root span is still ended and
/// covers the files traced before the failure.
pub async fn trace_junit_artifact<T>(params: TraceJunitParams<'_, T>) -> Result<Traced>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    let TraceJunitParams {
        tracer,
        start_time,
        path,
        base_html_url,
        parent,
    } = params;

    let locator = ReportLocator::new(path)?;
    let mut root = SpanScope::start(
        tracer,
        ROOT_SPAN_NAME,
        start_time,
        vec![
            KeyValue::new(TEST_SOURCE, SOURCE_JUNIT),
            KeyValue::new(TEST_SCOPE, SCOPE_RUN),
        ],
        parent,
    );
    let builder = SpanTreeBuilder::new(tracer, base_html_url);

    let mut files = 0usize;
    let mut longest_secs = 0.0_f64;
    for file in locator {
        let file = file?;
        debug!(file = %file.display(), "tracing report file");

        let xml = tokio::fs::read_to_string(&file).await.map_err(|e| {
            JunitTraceError::Io(format!("failed reading {}: {e}", file.display()))
        })?;
        let document = parse_document(&xml).map_err(|e| match e {
            JunitTraceError::Parse(msg) => {
                JunitTraceError::Parse(format!("{}: {msg}", file.display()))
            }
            other => other,
        })?;

        let traced = builder.trace_document(&document, start_time, root.context());
        longest_secs = longest_secs.max(traced.duration_secs);
        root.set_duration(longest_secs);
        root.mark(traced.status);
        files += 1;
    }

    debug!(files, "traced report files");
    Ok(root.finish())
}
