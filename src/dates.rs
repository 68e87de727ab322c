//! Date normalization for feed timestamps.
//!
//! Feeds publish dates in RFC 822/2822 (`pubDate`), RFC 3339 (Atom
//! `published`/`updated`) and a long tail of looser shapes. [`normalize`]
//! tries each family in turn, assumes UTC when the string carries no offset,
//! and converts the instant into the configured IANA timezone.

use crate::error::ParseError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Naive date-time layouts tried after the offset-aware parsers fail.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

/// Offset-aware layouts that RFC 2822/3339 parsing does not cover.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
    "%d %b %Y %H:%M:%S %z",
    "%Y/%m/%d %H:%M:%S %z",
];

const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y"];

/// Parse `raw` and render it in `tz`.
///
/// # Errors
///
/// [`ParseError::Date`] when no known layout matches. Callers drop the
/// owning entry; the run continues.
pub fn normalize(raw: &str, tz: Tz) -> Result<DateTime<Tz>, ParseError> {
    let instant = parse_instant(raw).ok_or_else(|| {
        warn!(date = %raw, "Failed to parse date");
        ParseError::Date(raw.to_string())
    })?;
    Ok(instant.with_timezone(&tz))
}

/// Parse into an absolute instant, treating offset-less values as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    // Feeds routinely carry a weekday that disagrees with the date, or none
    // of the RFC's zone names. Retry without the weekday prefix.
    let without_weekday = strip_weekday(s);
    if without_weekday != s {
        if let Ok(dt) = DateTime::parse_from_rfc2822(without_weekday) {
            return Some(dt);
        }
    }

    parse_loose(without_weekday).or_else(|| {
        // Unknown trailing zone abbreviation (e.g. "AST"): treat as UTC.
        let (head, tail) = without_weekday.rsplit_once(' ')?;
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphabetic()) {
            parse_naive(head).map(utc)
        } else {
            None
        }
    })
}

fn parse_loose(s: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize_utc_suffix(s);
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt);
        }
    }
    parse_naive(&normalized).map(utc)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_ONLY_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

/// "Wed, 05 Nov 2025 ..." -> "05 Nov 2025 ..."
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((head, rest)) if head.len() >= 3 && head.chars().all(|c| c.is_ascii_alphabetic()) => rest.trim_start(),
        _ => s,
    }
}

/// Map trailing `Z`, `UTC` or `GMT` onto a numeric offset the strftime parsers accept.
fn normalize_utc_suffix(s: &str) -> String {
    for suffix in [" UTC", " GMT", " UT", "Z"] {
        if let Some(head) = s.strip_suffix(suffix) {
            if head.chars().last().is_some_and(|c| c.is_ascii_digit()) {
                return format!("{head}+0000");
            }
        }
    }
    s.to_string()
}
