//! Search expression parsing for dataset queries.
//!
//! Command-line expressions follow the datacube query syntax:
//! `field=value` for equality and `field in [low, high]` for ranges.
//! `time` values accept whole years (`2020`), months (`2020-05`), days
//! (`2020-05-01`), or RFC 3339 timestamps; partial dates widen to the full
//! period they name.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static EQUALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)\s*=\s*(\S.*)$").expect("valid equals regex")
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)\s+in\s+\[\s*([^,\]]+?)\s*,\s*([^,\]]+?)\s*\]$")
        .expect("valid range regex")
});

/// Error raised for an expression string that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("malformed search expression '{0}': expected field=value or field in [low, high]")]
    Malformed(String),
    #[error("invalid time value '{0}': expected YYYY, YYYY-MM, YYYY-MM-DD, or RFC 3339")]
    BadTime(String),
    #[error("invalid numeric range bound '{0}' for field '{1}'")]
    BadNumber(String, String),
}

/// Scalar value in an equality expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchValue {
    Number(f64),
    Text(String),
}

impl SearchValue {
    fn parse(raw: &str) -> Self {
        match f64::from_str(raw) {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }
}

impl std::fmt::Display for SearchValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One parsed search predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum SearchExpression {
    Equals {
        field: String,
        value: SearchValue,
    },
    NumberRange {
        field: String,
        low: f64,
        high: f64,
    },
    TimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl SearchExpression {
    /// Field this predicate constrains (`"time"` for time ranges).
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::NumberRange { field, .. } => field,
            Self::TimeRange { .. } => "time",
        }
    }
}

/// Parse a slice of raw command-line expressions.
///
/// # Errors
///
/// Returns the first [`ExpressionError`] encountered; malformed expressions
/// are never silently dropped.
pub fn parse_expressions<S: AsRef<str>>(
    raw: &[S],
) -> Result<Vec<SearchExpression>, ExpressionError> {
    raw.iter().map(|s| parse_expression(s.as_ref())).collect()
}

/// Parse a single expression string.
///
/// # Errors
///
/// Returns [`ExpressionError`] when the string matches neither form or a
/// bound fails to parse.
pub fn parse_expression(raw: &str) -> Result<SearchExpression, ExpressionError> {
    let trimmed = raw.trim();

    if let Some(cap) = RANGE_RE.captures(trimmed) {
        let field = cap[1].to_string();
        let (low, high) = (cap[2].trim(), cap[3].trim());
        if field == "time" {
            return Ok(SearchExpression::TimeRange {
                start: parse_time_bound(low, false)?,
                end: parse_time_bound(high, true)?,
            });
        }
        let parse = |s: &str| {
            f64::from_str(s).map_err(|_| ExpressionError::BadNumber(s.to_string(), field.clone()))
        };
        return Ok(SearchExpression::NumberRange {
            low: parse(low)?,
            high: parse(high)?,
            field,
        });
    }

    if let Some(cap) = EQUALS_RE.captures(trimmed) {
        let field = cap[1].to_string();
        let value = cap[2].trim();
        if field == "time" {
            // A bare time equality names a period; widen it to a range.
            return Ok(SearchExpression::TimeRange {
                start: parse_time_bound(value, false)?,
                end: parse_time_bound(value, true)?,
            });
        }
        return Ok(SearchExpression::Equals {
            field,
            value: SearchValue::parse(value),
        });
    }

    Err(ExpressionError::Malformed(raw.to_string()))
}

/// Parse one time bound, widening partial dates to the start or end of the
/// period they name.
fn parse_time_bound(raw: &str, is_end: bool) -> Result<DateTime<Utc>, ExpressionError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let bad = || ExpressionError::BadTime(raw.to_string());

    let (year, month, day) = match raw.split('-').collect::<Vec<_>>().as_slice() {
        [y] => (y.parse::<i32>().map_err(|_| bad())?, None, None),
        [y, m] => (
            y.parse::<i32>().map_err(|_| bad())?,
            Some(m.parse::<u32>().map_err(|_| bad())?),
            None,
        ),
        [y, m, d] => (
            y.parse::<i32>().map_err(|_| bad())?,
            Some(m.parse::<u32>().map_err(|_| bad())?),
            Some(d.parse::<u32>().map_err(|_| bad())?),
        ),
        _ => return Err(bad()),
    };

    let month = month.unwrap_or(if is_end { 12 } else { 1 });
    let day = match (day, is_end) {
        (Some(d), _) => d,
        (None, false) => 1,
        (None, true) => days_in_month(year, month).ok_or_else(bad)?,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?;
    let time = if is_end {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    }
    .ok_or_else(bad)?;

    Ok(Utc.from_utc_datetime(&time))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next.signed_duration_since(first).num_days() as u32)
}
