//! Datetime coercion to ISO-8601
//!
//! A permissive pass handles RFC 3339/2822 and the common human spellings
//! ("Thursday, June 27th, 2024 at 10:00 AM"). When that fails, a trailing
//! `(EST)`-style zone label is dropped and a fixed list of formats is tried.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::expect_str;
use crate::errors::CoercionError;

/// Phrases that mean "no specific date" and coerce to null
pub const NON_SPECIFIC_DATES: [&str; 20] = [
    "tbd",
    "tba",
    "tbc",
    "n/a",
    "na",
    "none",
    "null",
    "unknown",
    "ongoing",
    "open",
    "open until filled",
    "until filled",
    "rolling",
    "asap",
    "immediately",
    "varies",
    "various",
    "not specified",
    "not available",
    "continuous",
];

/// Formats tried after the permissive pass, in order
pub const FALLBACK_FORMATS: [&str; 5] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%B %d, %Y - %I:%M%p",
    "%m/%d/%Y",
];

const PERMISSIVE_DATETIME_FORMATS: [&str; 20] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M%p",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%B %d %Y %I:%M %p",
    "%B %d %Y %I:%M%p",
    "%A %B %d %Y %I:%M %p",
    "%A %B %d %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %B %Y %I:%M %p",
];

const PERMISSIVE_OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

const PERMISSIVE_DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%B %d %Y",
    "%d %B %Y",
    "%A %B %d %Y",
    "%A %d %B %Y",
    "%Y %B %d",
];

static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal regex"));
static AT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+at\s+").expect("at regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static ZONE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("zone label regex"));

/// ISO-8601 string, or null for an empty value or a non-specific phrase.
pub fn coerce_datetime(value: &Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let raw = expect_str(value, "datetime")?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_non_specific(trimmed) {
        return Ok(Value::Null);
    }

    parse_permissive(trimmed)
        .or_else(|| parse_fallback(trimmed))
        .map(Value::String)
        .ok_or_else(|| CoercionError::InvalidDate(raw.to_string()))
}

fn is_non_specific(value: &str) -> bool {
    let lowered = value.trim_end_matches('.').trim().to_lowercase();
    NON_SPECIFIC_DATES.contains(&lowered.as_str())
}

fn parse_permissive(value: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(format_aware(&dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(format_aware(&dt));
    }

    let cleaned = ORDINAL_RE.replace_all(value, "$1");
    let cleaned = cleaned.replace(',', " ");
    let cleaned = AT_RE.replace_all(&cleaned, " ");
    let cleaned = WHITESPACE_RE.replace_all(cleaned.trim(), " ");

    for fmt in PERMISSIVE_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&cleaned, fmt) {
            return Some(format_aware(&dt));
        }
    }
    parse_with(&cleaned, &PERMISSIVE_DATETIME_FORMATS, &PERMISSIVE_DATE_FORMATS)
}

fn parse_fallback(value: &str) -> Option<String> {
    let stripped = ZONE_LABEL_RE.replace(value, "");
    let stripped = stripped.trim();
    parse_with(stripped, &FALLBACK_FORMATS, &FALLBACK_FORMATS)
}

fn parse_with(value: &str, datetime_formats: &[&str], date_formats: &[&str]) -> Option<String> {
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(format_naive(&dt));
        }
    }
    for fmt in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| format_naive(&dt));
        }
    }
    None
}

fn format_naive(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn format_aware(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()
}
