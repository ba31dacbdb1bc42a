use chrono::{DateTime, Utc};
use junit_trace_core::model::junit::{Document, Problem, TestCase, TestSuite, TestSuites};
use junit_trace_core::time::{offset_secs, parse_report_timestamp};
use opentelemetry::trace::Tracer;
use opentelemetry::{Context, KeyValue};
use tracing::{debug, warn};

use crate::attributes::*;
use crate::scope::{Outcome, SpanScope, Traced};

pub const DEFAULT_SUITES_NAME: &str = "Junit Test Suites";

/// Turns parsed JUnit documents into nested spans.
///
/// Spans start in document order and each one is closed before its parent. Start and
/// end times come from the report, never from the wall clock.
pub struct SpanTreeBuilder<'a, T> {
    tracer: &'a T,
    base_html_url: Option<&'a str>,
}

impl<'a, T> SpanTreeBuilder<'a, T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: &'a T, base_html_url: Option<&'a str>) -> Self {
        Self {
            tracer,
            base_html_url,
        }
    }

    /// A lone suite starts at its own timestamp when it has one; a collection always
    /// starts at `start`.
    pub fn trace_document(
        &self,
        document: &Document,
        start: DateTime<Utc>,
        parent: &Context,
    ) -> Traced {
        match document {
            Document::Suite(suite) => self.trace_suite(suite, suite_start(suite, start), parent),
            Document::Suites(suites) => self.trace_suites(suites, start, parent),
        }
    }

    pub fn trace_suites(
        &self,
        suites: &TestSuites,
        start: DateTime<Utc>,
        parent: &Context,
    ) -> Traced {
        let name = suites
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_SUITES_NAME.to_string());
        debug!(suites = %name, "tracing test suites");

        let attributes = AttributeSet::default()
            .opt_count(TEST_TESTS, suites.tests)
            .opt_count(TEST_FAILURES, suites.failures)
            .opt_count(TEST_ERRORS, suites.errors)
            .opt_count(TEST_DISABLED, suites.disabled)
            .opt_secs(TEST_TIME, suites.time)
            .build();

        let mut scope = SpanScope::start(self.tracer, name, start, attributes, parent);
        scope.mark(Outcome::failing_if(suites.reports_problems()));

        let mut total_secs = 0.0;
        for suite in &suites.testsuite {
            let traced = self.trace_suite(suite, suite_start(suite, start), scope.context());
            total_secs += traced.duration_secs;
            scope.mark(traced.status);
        }
        scope.set_duration(total_secs);
        scope.finish()
    }

    /// Cases run back to back from `start`. An explicit positive suite `time` wins over
    /// the case sum even when the two disagree.
    pub fn trace_suite(&self, suite: &TestSuite, start: DateTime<Utc>, parent: &Context) -> Traced {
        debug!(suite = %suite.name, cases = suite.testcase.len(), "tracing test suite");

        let mut attributes = AttributeSet::default()
            .text(TEST_NAME, suite.name.clone())
            .text(TEST_SCOPE, SCOPE_SUITE)
            .opt_count(TEST_TESTS, suite.tests)
            .opt_count(TEST_FAILURES, suite.failures)
            .opt_count(TEST_ERRORS, suite.errors)
            .opt_secs(TEST_TIME, suite.time)
            .opt_count(TEST_DISABLED, suite.disabled)
            .opt_count(TEST_SKIPPED, suite.skipped)
            .opt_text(TEST_TIMESTAMP, suite.timestamp.as_ref())
            .opt_text(TEST_HOSTNAME, suite.hostname.as_ref())
            .opt_text(TEST_ID, suite.id.as_ref())
            .opt_text(TEST_PACKAGE, suite.package.as_ref())
            .opt_text(TEST_SYSTEM_OUT, suite.system_out.as_ref())
            .opt_text(TEST_SYSTEM_ERR, suite.system_err.as_ref());
        if let Some(base) = self.base_html_url {
            attributes = attributes.text(TEST_HTML_URL, format!("{base}/{}", suite.name));
        }

        let mut scope = SpanScope::start(
            self.tracer,
            suite.name.clone(),
            start,
            attributes.build(),
            parent,
        );
        scope.mark(Outcome::failing_if(suite.reports_problems()));

        let (_, case_secs, case_status) = suite.testcase.iter().fold(
            (start, 0.0, Outcome::Ok),
            |(clock, sum, status), case| {
                let traced = self.trace_case(case, clock, scope.context());
                (
                    offset_secs(clock, traced.duration_secs),
                    sum + traced.duration_secs,
                    status.max(traced.status),
                )
            },
        );
        scope.mark(case_status);
        scope.set_duration(suite.time.filter(|t| *t > 0.0).unwrap_or(case_secs));
        scope.finish()
    }

    pub fn trace_case(&self, case: &TestCase, start: DateTime<Utc>, parent: &Context) -> Traced {
        debug!(case = %case.name, "tracing test case");

        let attributes = AttributeSet::default()
            .text(TEST_NAME, case.name.clone())
            .text(TEST_SCOPE, SCOPE_CASE)
            .opt_text(TEST_CLASSNAME, case.classname.as_ref())
            .opt_secs(TEST_TIME, case.time)
            .opt_text(TEST_STATUS, case.status.as_ref())
            .opt_count(TEST_ASSERTIONS, case.assertions)
            .opt_text(TEST_SYSTEM_OUT, case.system_out.as_ref())
            .opt_text(TEST_SYSTEM_ERR, case.system_err.as_ref())
            .build();

        let mut scope = SpanScope::start(self.tracer, case.name.clone(), start, attributes, parent);
        scope.mark(Outcome::failing_if(case.is_failing()));

        for (idx, skipped) in case.skipped.iter().enumerate() {
            if let Some(message) = &skipped.message {
                scope.set_attribute(KeyValue::new(
                    format!("test.skipped.{idx}.message"),
                    message.clone(),
                ));
            }
        }
        for attribute in problem_attributes("error", &case.error)
            .chain(problem_attributes("failure", &case.failure))
        {
            scope.set_attribute(attribute);
        }

        scope.set_duration(case.elapsed_secs());
        scope.finish()
    }
}

fn problem_attributes<'p>(
    kind: &'static str,
    problems: &'p [Problem],
) -> impl Iterator<Item = KeyValue> + 'p {
    problems.iter().enumerate().flat_map(move |(idx, problem)| {
        [
            ("message", &problem.message),
            ("type", &problem.r#type),
            ("inner", &problem.inner),
        ]
        .into_iter()
        .filter_map(move |(field, value)| {
            value
                .as_ref()
                .map(|v| KeyValue::new(format!("test.{kind}.{idx}.{field}"), v.clone()))
        })
    })
}

fn suite_start(suite: &TestSuite, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = suite.timestamp.as_deref() else {
        return fallback;
    };
    parse_report_timestamp(raw).unwrap_or_else(|| {
        warn!(suite = %suite.name, timestamp = raw, "unparseable suite timestamp, using parent start");
        fallback
    })
}
