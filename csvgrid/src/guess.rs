//! Column type guessing.
//!
//! Purely advisory: the label is attached to the column metadata and the
//! values themselves stay the original strings. Matching uses fixed ASCII
//! grammars and explicit chrono format strings, so the result never depends on
//! the runtime locale.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:0|[1-9][0-9]*)$").expect("valid integer pattern"));

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("valid numeric pattern")
});

/// Date layouts tried by default.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Time-of-day layouts appended to each date layout for date-times.
pub const DEFAULT_TIME_FORMATS: &[&str] = &[
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
];

// =============================================================================
// Column Type
// =============================================================================

/// Diagnostic type label, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Numeric,
    Date,
    DateTime,
    Text,
}

impl ColumnType {
    /// Candidates in the order they are tried.
    pub const ORDER: [ColumnType; 5] = [
        ColumnType::Integer,
        ColumnType::Numeric,
        ColumnType::Date,
        ColumnType::DateTime,
        ColumnType::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Numeric => "numeric",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Text => "text",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for integer or decimal/scientific text.
pub fn looks_numeric(value: &str) -> bool {
    let value = value.trim();
    is_integer(value) || NUMERIC.is_match(value)
}

fn is_integer(value: &str) -> bool {
    INTEGER.is_match(value) && value.parse::<i64>().is_ok()
}

// =============================================================================
// Type Guesser
// =============================================================================

/// Locale-free type guesser. The format lists are the whole configuration.
#[derive(Debug, Clone)]
pub struct TypeGuesser {
    date_formats: Vec<String>,
    datetime_formats: Vec<String>,
}

impl Default for TypeGuesser {
    fn default() -> Self {
        Self::with_formats(DEFAULT_DATE_FORMATS, DEFAULT_TIME_FORMATS)
    }
}

impl TypeGuesser {
    /// Build a guesser from date layouts and time-of-day layouts.
    ///
    /// Each date-time layout is a date layout, a space, a time layout, with
    /// and without a trailing numeric UTC offset.
    pub fn with_formats(dates: &[&str], times: &[&str]) -> Self {
        let date_formats: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
        let mut datetime_formats = Vec::new();
        for date in dates {
            for time in times {
                datetime_formats.push(format!("{} {}", date, time));
                datetime_formats.push(format!("{} {} %z", date, time));
            }
            datetime_formats.push(format!("{}T%H:%M:%S", date));
        }
        Self {
            date_formats,
            datetime_formats,
        }
    }

    /// Does a non-empty value fit `ty`?
    pub fn matches(&self, ty: ColumnType, value: &str) -> bool {
        let value = value.trim();
        match ty {
            ColumnType::Integer => is_integer(value),
            ColumnType::Numeric => NUMERIC.is_match(value),
            ColumnType::Date => self.is_date(value),
            ColumnType::DateTime => self.is_date(value) || self.is_datetime(value),
            ColumnType::Text => true,
        }
    }

    /// Most specific type every non-empty value matches.
    ///
    /// Empty values never disqualify a type; an all-empty column is text.
    pub fn guess<S: AsRef<str>>(&self, values: &[S]) -> ColumnType {
        let present: Vec<&str> = values
            .iter()
            .map(|v| v.as_ref())
            .filter(|v| !v.trim().is_empty())
            .collect();
        if present.is_empty() {
            return ColumnType::Text;
        }
        ColumnType::ORDER
            .into_iter()
            .find(|&ty| present.iter().all(|v| self.matches(ty, v)))
            .unwrap_or(ColumnType::Text)
    }

    fn is_date(&self, value: &str) -> bool {
        // Fast reject: every date layout carries at least one digit.
        if !value.bytes().any(|b| b.is_ascii_digit()) || !value.is_ascii() {
            return false;
        }
        self.date_formats
            .iter()
            .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
    }

    fn is_datetime(&self, value: &str) -> bool {
        if !value.is_ascii() {
            return false;
        }
        if DateTime::parse_from_rfc3339(value).is_ok() {
            return true;
        }
        self.datetime_formats.iter().any(|f| {
            if f.ends_with("%z") {
                DateTime::parse_from_str(value, f).is_ok()
            } else {
                NaiveDateTime::parse_from_str(value, f).is_ok()
            }
        })
    }
}
