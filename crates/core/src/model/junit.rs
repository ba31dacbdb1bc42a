//! In-memory shape of a parsed JUnit XML report.
//!
//! A report is either a single `<testsuite>` or a `<testsuites>` collection. Counts and
//! times stay optional so that consumers can tell "absent" apart from "zero".

/// Case `status` value that marks a passing test. Any other non-empty value fails the case.
pub const PASS_STATUS: &str = "PASS";

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Suite(TestSuite),
    Suites(TestSuites),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuites {
    pub name: Option<String>,
    pub tests: Option<u64>,
    pub failures: Option<u64>,
    pub errors: Option<u64>,
    pub disabled: Option<u64>,
    pub time: Option<f64>,
    pub testsuite: Vec<TestSuite>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub tests: Option<u64>,
    pub failures: Option<u64>,
    pub errors: Option<u64>,
    pub disabled: Option<u64>,
    pub skipped: Option<u64>,
    pub time: Option<f64>,
    pub timestamp: Option<String>,
    pub hostname: Option<String>,
    pub id: Option<String>,
    pub package: Option<String>,
    pub system_out: Option<String>,
    pub system_err: Option<String>,
    pub testcase: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub classname: Option<String>,
    pub time: Option<f64>,
    pub status: Option<String>,
    pub assertions: Option<u64>,
    pub system_out: Option<String>,
    pub system_err: Option<String>,
    pub error: Vec<Problem>,
    pub failure: Vec<Problem>,
    pub skipped: Vec<Skipped>,
}

/// An `<error>` or `<failure>` entry. Every field is optional; partial entries are legal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    pub message: Option<String>,
    pub r#type: Option<String>,
    pub inner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skipped {
    pub message: Option<String>,
}

impl TestSuites {
    pub fn reports_problems(&self) -> bool {
        counts_problems(self.errors, self.failures)
    }
}

impl TestSuite {
    pub fn reports_problems(&self) -> bool {
        counts_problems(self.errors, self.failures)
    }
}

impl TestCase {
    pub fn is_failing(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| !s.is_empty() && s != PASS_STATUS)
            || !self.error.is_empty()
            || !self.failure.is_empty()
    }

    /// Elapsed seconds, `0` when the report carries no `time`.
    pub fn elapsed_secs(&self) -> f64 {
        self.time.unwrap_or(0.0)
    }
}

fn counts_problems(errors: Option<u64>, failures: Option<u64>) -> bool {
    errors.unwrap_or(0) > 0 || failures.unwrap_or(0) > 0
}
