//! Timestamp parsing for mixed-format exports.
//!
//! Exports in the wild mix `2024-03-01T10:00:00Z`, `2024-03-01 10:00:00.123+00:00`,
//! `2024-03-01 10:00:00 UTC` and bare `2024-03-01 10:00:00` in the same file.
//! Every accepted form is normalized to UTC; naive values are taken as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

const SECONDS_PER_DAY: i64 = 86_400;

/// Parse a timestamp cell into a UTC instant.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "... UTC" suffix carries no offset digits
    let s = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix("UTC"))
        .map(str::trim_end)
        .unwrap_or(s);

    // Zulu with a space separator, which RFC 3339 parsing rejects
    let zulu;
    let s = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(stripped) => {
            zulu = format!("{stripped}+00:00");
            zulu.as_str()
        }
        None => s,
    };

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days from `from` to `to`, floored, so a partial day never counts.
///
/// Negative when `to` precedes `from`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let delta = to - from;
    let mut secs = delta.num_seconds();
    if delta - Duration::seconds(secs) < Duration::zero() {
        secs -= 1;
    }
    secs.div_euclid(SECONDS_PER_DAY)
}

/// Lossless form used for export; reloads to the same instant.
pub fn format_export(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Human form used in the detail table.
pub fn format_display(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
