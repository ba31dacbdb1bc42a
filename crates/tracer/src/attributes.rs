//! Span attribute keys.

use opentelemetry::KeyValue;

pub const ERROR: &str = "error";

pub const TEST_SOURCE: &str = "test.source";
pub const TEST_SCOPE: &str = "test.scope";
pub const TEST_NAME: &str = "test.name";
pub const TEST_TESTS: &str = "test.tests";
pub const TEST_FAILURES: &str = "test.failures";
pub const TEST_ERRORS: &str = "test.errors";
pub const TEST_DISABLED: &str = "test.disabled";
pub const TEST_SKIPPED: &str = "test.skipped";
pub const TEST_TIME: &str = "test.time";
pub const TEST_TIMESTAMP: &str = "test.timestamp";
pub const TEST_HOSTNAME: &str = "test.hostname";
pub const TEST_ID: &str = "test.id";
pub const TEST_PACKAGE: &str = "test.package";
pub const TEST_SYSTEM_OUT: &str = "test.system.out";
pub const TEST_SYSTEM_ERR: &str = "test.system.err";
pub const TEST_HTML_URL: &str = "test.html_url";
pub const TEST_CLASSNAME: &str = "test.classname";
pub const TEST_STATUS: &str = "test.status";
pub const TEST_ASSERTIONS: &str = "test.assertions";

pub const SOURCE_JUNIT: &str = "junit";
pub const SCOPE_RUN: &str = "Run";
pub const SCOPE_SUITE: &str = "Suite";
pub const SCOPE_CASE: &str = "Case";

/// Collects attributes, dropping the ones whose value is absent.
#[derive(Default)]
pub(crate) struct AttributeSet(Vec<KeyValue>);

impl AttributeSet {
    pub(crate) fn text(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.push(KeyValue::new(key, value.into()));
        self
    }

    pub(crate) fn opt_text(self, key: &'static str, value: Option<&String>) -> Self {
        match value {
            Some(v) => self.text(key, v.clone()),
            None => self,
        }
    }

    pub(crate) fn opt_count(mut self, key: &'static str, value: Option<u64>) -> Self {
        if let Some(v) = value {
            self.0
                .push(KeyValue::new(key, i64::try_from(v).unwrap_or(i64::MAX)));
        }
        self
    }

    pub(crate) fn opt_secs(mut self, key: &'static str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            self.0.push(KeyValue::new(key, v));
        }
        self
    }

    pub(crate) fn build(self) -> Vec<KeyValue> {
        self.0
    }
}
