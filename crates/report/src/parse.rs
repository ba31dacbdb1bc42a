//! JUnit XML parsing into [`Document`].
//!
//! Only the two standard shapes are understood: a `<testsuite>` root and a
//! `<testsuites>` root holding `<testsuite>` children. Elements outside that model
//! (`<properties>`, nested suites, vendor extensions) are skipped.

use junit_trace_core::error::{JunitTraceError, Result};
use junit_trace_core::model::junit::{
    Document, Problem, Skipped, TestCase, TestSuite, TestSuites,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

const TAG_TEST_SUITES: &[u8] = b"testsuites";
const TAG_TEST_SUITE: &[u8] = b"testsuite";
const TAG_TEST_CASE: &[u8] = b"testcase";
const TAG_ERROR: &[u8] = b"error";
const TAG_FAILURE: &[u8] = b"failure";
const TAG_SKIPPED: &[u8] = b"skipped";
const TAG_SYSTEM_OUT: &[u8] = b"system-out";
const TAG_SYSTEM_ERR: &[u8] = b"system-err";

type XmlReader<'a> = Reader<&'a [u8]>;

pub fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match next_event(&mut reader)? {
            Event::Start(e) => return read_root(&mut reader, &e, false),
            Event::Empty(e) => return read_root(&mut reader, &e, true),
            Event::Eof => {
                return Err(JunitTraceError::Parse(
                    "report has no root element".to_string(),
                ));
            }
            _ => (),
        }
    }
}

fn read_root(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<Document> {
    match e.name().as_ref() {
        TAG_TEST_SUITES => Ok(Document::Suites(read_suites(reader, e, empty)?)),
        TAG_TEST_SUITE => Ok(Document::Suite(read_suite(reader, e, empty)?)),
        other => Err(JunitTraceError::Parse(format!(
            "unsupported root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn read_suites(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<TestSuites> {
    let mut suites = TestSuites {
        name: parse_attr::string(e, "name")?,
        tests: parse_attr::count(e, "tests")?,
        failures: parse_attr::count(e, "failures")?,
        errors: parse_attr::count(e, "errors")?,
        disabled: parse_attr::count(e, "disabled")?,
        time: parse_attr::seconds(e, "time")?,
        testsuite: Vec::new(),
    };
    if empty {
        return Ok(suites);
    }

    loop {
        match next_event(reader)? {
            Event::Start(child) => match child.name().as_ref() {
                TAG_TEST_SUITE => suites.testsuite.push(read_suite(reader, &child, false)?),
                _ => skip(reader, &child)?,
            },
            Event::Empty(child) => {
                if child.name().as_ref() == TAG_TEST_SUITE {
                    suites.testsuite.push(read_suite(reader, &child, true)?);
                }
            }
            Event::End(_) => return Ok(suites),
            Event::Eof => return Err(unexpected_eof("testsuites")),
            _ => (),
        }
    }
}

fn read_suite(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<TestSuite> {
    let mut suite = TestSuite {
        name: parse_attr::required(e, "name", "testsuite")?,
        tests: parse_attr::count(e, "tests")?,
        failures: parse_attr::count(e, "failures")?,
        errors: parse_attr::count(e, "errors")?,
        disabled: parse_attr::count(e, "disabled")?,
        skipped: parse_attr::count(e, "skipped")?,
        time: parse_attr::seconds(e, "time")?,
        timestamp: parse_attr::string(e, "timestamp")?,
        hostname: parse_attr::string(e, "hostname")?,
        id: parse_attr::string(e, "id")?,
        package: parse_attr::string(e, "package")?,
        ..TestSuite::default()
    };
    if empty {
        return Ok(suite);
    }

    loop {
        match next_event(reader)? {
            Event::Start(child) => match child.name().as_ref() {
                TAG_TEST_CASE => suite.testcase.push(read_case(reader, &child, false)?),
                TAG_SYSTEM_OUT => suite.system_out = read_text(reader)?,
                TAG_SYSTEM_ERR => suite.system_err = read_text(reader)?,
                _ => skip(reader, &child)?,
            },
            Event::Empty(child) => {
                if child.name().as_ref() == TAG_TEST_CASE {
                    suite.testcase.push(read_case(reader, &child, true)?);
                }
            }
            Event::End(_) => return Ok(suite),
            Event::Eof => return Err(unexpected_eof("testsuite")),
            _ => (),
        }
    }
}

fn read_case(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<TestCase> {
    let mut case = TestCase {
        name: parse_attr::required(e, "name", "testcase")?,
        classname: parse_attr::string(e, "classname")?,
        time: parse_attr::seconds(e, "time")?,
        status: parse_attr::string(e, "status")?,
        assertions: parse_attr::count(e, "assertions")?,
        ..TestCase::default()
    };
    if empty {
        return Ok(case);
    }

    loop {
        match next_event(reader)? {
            Event::Start(child) => match child.name().as_ref() {
                TAG_ERROR => case.error.push(read_problem(reader, &child, false)?),
                TAG_FAILURE => case.failure.push(read_problem(reader, &child, false)?),
                TAG_SKIPPED => {
                    case.skipped.push(Skipped {
                        message: parse_attr::string(&child, "message")?,
                    });
                    skip(reader, &child)?;
                }
                TAG_SYSTEM_OUT => case.system_out = read_text(reader)?,
                TAG_SYSTEM_ERR => case.system_err = read_text(reader)?,
                _ => skip(reader, &child)?,
            },
            Event::Empty(child) => match child.name().as_ref() {
                TAG_ERROR => case.error.push(read_problem(reader, &child, true)?),
                TAG_FAILURE => case.failure.push(read_problem(reader, &child, true)?),
                TAG_SKIPPED => case.skipped.push(Skipped {
                    message: parse_attr::string(&child, "message")?,
                }),
                _ => (),
            },
            Event::End(_) => return Ok(case),
            Event::Eof => return Err(unexpected_eof("testcase")),
            _ => (),
        }
    }
}

fn read_problem(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<Problem> {
    Ok(Problem {
        message: parse_attr::string(e, "message")?,
        r#type: parse_attr::string(e, "type")?,
        inner: if empty { None } else { read_text(reader)? },
    })
}

/// Collects text and CDATA up to the end of the current element.
fn read_text(reader: &mut XmlReader<'_>) -> Result<Option<String>> {
    let mut text = String::new();
    loop {
        match next_event(reader)? {
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| JunitTraceError::Parse(format!("invalid text content: {e}")))?;
                text.push_str(&value);
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::Start(child) => skip(reader, &child)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("text element")),
            _ => (),
        }
    }
    Ok((!text.is_empty()).then_some(text))
}

fn skip(reader: &mut XmlReader<'_>, e: &BytesStart<'_>) -> Result<()> {
    reader
        .read_to_end(e.name())
        .map(|_| ())
        .map_err(|err| xml_error(reader, err))
}

fn next_event<'a>(reader: &mut XmlReader<'a>) -> Result<Event<'a>> {
    reader.read_event().map_err(|err| xml_error(reader, err))
}

fn xml_error(reader: &XmlReader<'_>, err: quick_xml::Error) -> JunitTraceError {
    JunitTraceError::Parse(format!(
        "malformed XML at position {}: {err}",
        reader.error_position()
    ))
}

fn unexpected_eof(element: &str) -> JunitTraceError {
    JunitTraceError::Parse(format!("unexpected end of report inside <{element}>"))
}

mod parse_attr {
    use junit_trace_core::error::{JunitTraceError, Result};
    use quick_xml::events::BytesStart;

    /// Attribute value; an empty value counts as absent.
    pub fn string(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
        for attr in e.attributes() {
            let attr = attr
                .map_err(|err| JunitTraceError::Parse(format!("malformed attribute: {err}")))?;
            if attr.key.as_ref() == key.as_bytes() {
                let value = attr.unescape_value().map_err(|err| {
                    JunitTraceError::Parse(format!("malformed value for {key}: {err}"))
                })?;
                return Ok(Some(value.into_owned()).filter(|v| !v.is_empty()));
            }
        }
        Ok(None)
    }

    pub fn required(e: &BytesStart<'_>, key: &str, element: &str) -> Result<String> {
        string(e, key)?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| JunitTraceError::Parse(format!("<{element}> is missing {key}")))
    }

    /// Non-negative count. Empty values are treated as absent; some producers write
    /// integral counts as `3.0`.
    pub fn count(e: &BytesStart<'_>, key: &str) -> Result<Option<u64>> {
        let Some(raw) = non_empty(e, key)? else {
            return Ok(None);
        };
        if let Ok(v) = raw.parse::<u64>() {
            return Ok(Some(v));
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as u64)),
            _ => Err(JunitTraceError::Parse(format!(
                "{key} must be a non-negative count, got {raw}"
            ))),
        }
    }

    /// Duration in seconds. Thousands separators are tolerated.
    pub fn seconds(e: &BytesStart<'_>, key: &str) -> Result<Option<f64>> {
        let Some(raw) = non_empty(e, key)? else {
            return Ok(None);
        };
        match raw.replace(',', "").parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(JunitTraceError::Parse(format!(
                "{key} must be a number of seconds, got {raw}"
            ))),
        }
    }

    fn non_empty(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
        Ok(string(e, key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}
