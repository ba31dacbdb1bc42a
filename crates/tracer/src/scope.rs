use std::borrow::Cow;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use junit_trace_core::time::offset_secs;
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::attributes::ERROR;

/// Pass/fail state of a span. `Error` orders above `Ok` so folding with `max` never
/// downgrades a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    #[default]
    Ok,
    Error,
}

impl Outcome {
    pub fn failing_if(failing: bool) -> Self {
        if failing { Self::Error } else { Self::Ok }
    }

    pub fn is_error(self) -> bool {
        self == Self::Error
    }
}

/// What a traced node reports to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Traced {
    pub duration_secs: f64,
    pub status: Outcome,
}

/// Owns an open span and ends it on drop.
///
/// The span is closed with whatever status and duration were recorded so far, so a
/// builder that bails out early still leaves a well-formed span behind.
pub(crate) struct SpanScope {
    cx: Context,
    start: DateTime<Utc>,
    duration_secs: f64,
    status: Outcome,
}

impl SpanScope {
    pub(crate) fn start<T>(
        tracer: &T,
        name: impl Into<Cow<'static, str>>,
        start: DateTime<Utc>,
        attributes: Vec<KeyValue>,
        parent: &Context,
    ) -> Self
    where
        T: Tracer,
        T::Span: Send + Sync + 'static,
    {
        let span = tracer
            .span_builder(name)
            .with_start_time(SystemTime::from(start))
            .with_attributes(attributes)
            .start_with_context(tracer, parent);
        Self {
            cx: parent.with_span(span),
            start,
            duration_secs: 0.0,
            status: Outcome::Ok,
        }
    }

    pub(crate) fn context(&self) -> &Context {
        &self.cx
    }

    pub(crate) fn mark(&mut self, status: Outcome) {
        self.status = self.status.max(status);
    }

    pub(crate) fn set_duration(&mut self, secs: f64) {
        self.duration_secs = secs.max(0.0);
    }

    pub(crate) fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    pub(crate) fn finish(self) -> Traced {
        Traced {
            duration_secs: self.duration_secs,
            status: self.status,
        }
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new(ERROR, self.status.is_error()));
        span.set_status(match self.status {
            Outcome::Ok => Status::Ok,
            Outcome::Error => Status::error(""),
        });
        span.end_with_timestamp(SystemTime::from(offset_secs(
            self.start,
            self.duration_secs,
        )));
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::TracerProvider;

    use super::*;

    #[test]
    fn outcome_folds_to_error() {
        assert_eq!(Outcome::Ok.max(Outcome::Error), Outcome::Error);
        assert_eq!(Outcome::Error.max(Outcome::Ok), Outcome::Error);
        assert_eq!(Outcome::failing_if(false), Outcome::Ok);
    }

    #[test]
    fn dropped_scope_ends_span_with_recorded_state() {
        let (provider, exporter) = testkit::in_memory_provider();
        let tracer = provider.tracer("test");
        let start = testkit::run_start();

        {
            let mut scope = SpanScope::start(&tracer, "early exit", start, vec![], &Context::new());
            scope.set_duration(1.5);
            scope.mark(Outcome::Error);
            scope.mark(Outcome::Ok);
        }

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert!(matches!(span.status, Status::Error { .. }));
        assert_eq!(
            testkit::attr(span, ERROR),
            Some(&opentelemetry::Value::Bool(true))
        );
        assert_eq!(
            span.end_time.duration_since(span.start_time).unwrap().as_millis(),
            1500
        );
    }
}
