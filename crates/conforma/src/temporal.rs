//! Date parsing shared by the `date` filter and the `isDate` validator
//!
//! Formats use moment-style tokens (`YYYY-MM-DD`, `DD.MM.YYYY HH:mm`), the
//! notation form definitions are usually written in. Missing month or day
//! components default to the first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

/// Token table, longest tokens first so `YYYY` wins over `YY`.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("SSS", "%3f"),
    ("A", "%p"),
];

/// Translates a moment-style format into a chrono strftime format.
pub fn strftime_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;

    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }

    out
}

/// Parses `input` with an optional moment-style `format`.
///
/// Without a format, RFC 3339 and `YYYY-MM-DD` are accepted.
pub fn parse_date(input: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match format {
        Some(format) => parse_with_format(input, &strftime_format(format)),
        None => DateTime::parse_from_rfc3339(input)
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .ok()
            .or_else(|| parse_with_format(input, "%Y-%m-%dT%H:%M:%S"))
            .or_else(|| parse_with_format(input, "%Y-%m-%d")),
    }
}

fn parse_with_format(input: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
        return Some(dt);
    }

    // Pad the components chrono insists on, then parse as a date.
    let mut input = input.to_string();
    let mut format = format.to_string();
    if !format.contains("%m") && !format.contains("%b") && !format.contains("%B") {
        input.push_str("|01");
        format.push_str("|%m");
    }
    if !format.contains("%d") {
        input.push_str("|01");
        format.push_str("|%d");
    }

    NaiveDate::parse_from_str(&input, &format)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Renders a parsed date as an RFC 3339 UTC timestamp with milliseconds.
pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)
}
