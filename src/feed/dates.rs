//! Publication date normalization.
//!
//! Feeds publish dates in every format imaginable. Stored dates are RFC 3339
//! with millisecond precision (`2024-01-01T00:00:00.000Z`) so they sort as
//! plain strings, but a date is best-effort metadata: a value we cannot parse
//! is kept verbatim rather than failing the entry.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive layouts seen in the wild that RFC 2822/3339 parsing rejects.
/// Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Zoned layouts beyond what the RFC parsers accept.
const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%a, %d %b %Y %H:%M:%S %z"];

/// Resolve an entry's publication date.
///
/// Order of preference:
/// 1. `iso_date`, verbatim (the parser already normalized it)
/// 2. `raw_date` converted to RFC 3339
/// 3. `raw_date` as-is when it cannot be parsed
/// 4. `None`
///
/// Empty strings count as absent.
///
/// # Examples
///
/// ```
/// use whackamole::feed::normalize_pub_date;
///
/// assert_eq!(
///     normalize_pub_date(None, Some("Mon, 01 Jan 2024 00:00:00 GMT")).as_deref(),
///     Some("2024-01-01T00:00:00.000Z")
/// );
/// assert_eq!(normalize_pub_date(None, Some("not-a-date")).as_deref(), Some("not-a-date"));
/// assert_eq!(normalize_pub_date(None, None), None);
/// ```
pub fn normalize_pub_date(iso_date: Option<&str>, raw_date: Option<&str>) -> Option<String> {
    if let Some(iso) = iso_date.filter(|d| !d.is_empty()) {
        return Some(iso.to_string());
    }

    let raw = raw_date.filter(|d| !d.is_empty())?;
    match parse_date(raw) {
        Some(dt) => Some(to_iso(&dt)),
        None => {
            tracing::debug!(raw = %raw, "Unparseable publication date, keeping raw value");
            Some(raw.to_string())
        }
    }
}

/// Format a timestamp in the canonical stored form.
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Best-effort parse of a feed date string.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Trailing "GMT"/"UTC" on otherwise naive layouts
    let naive = s
        .strip_suffix(" GMT")
        .or_else(|| s.strip_suffix(" UTC"))
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s);

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}
