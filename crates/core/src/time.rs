use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::error::{JunitTraceError, Result};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                JunitTraceError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(JunitTraceError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

/// Parses a JUnit `timestamp` attribute. Reports usually omit the offset, in which
/// case the value is read as UTC.
pub fn parse_report_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `start` moved forward by `secs`, rounded to the millisecond. Negative or non-finite
/// offsets are treated as zero so an end time never precedes its start.
pub fn offset_secs(start: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    if !secs.is_finite() || secs <= 0.0 {
        return start;
    }
    let millis = (secs * 1000.0).round() as i64;
    start
        .checked_add_signed(TimeDelta::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
