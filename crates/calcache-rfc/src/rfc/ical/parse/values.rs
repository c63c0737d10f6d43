//! Value type parsers for iCalendar (RFC 5545 §3.3).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{Date, DateTime, DateTimeForm, Duration, UtcOffset};

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a DATE value (RFC 5545 §3.3.4), e.g. `19970714`.
///
/// ## Errors
/// Returns an error if the string is not a valid 8-digit date.
pub fn parse_date(s: &str, line: usize, col: usize) -> ParseResult<Date> {
    let err = || ParseError::new(ParseErrorKind::InvalidDate, line, col).with_context(s.to_string());
    if s.len() != 8 || !all_digits(s) {
        return Err(err());
    }

    let year = s[0..4].parse::<u16>().ok().ok_or_else(err)?;
    let month = s[4..6].parse::<u8>().ok().ok_or_else(err)?;
    let day = s[6..8].parse::<u8>().ok().ok_or_else(err)?;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(err());
    }

    Ok(Date::new(year, month, day))
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5), e.g. `19970714T133000Z`.
///
/// `tzid` comes from the property's `TZID` parameter and is ignored for UTC
/// values.
///
/// ## Errors
/// Returns an error if the string is not a valid date-time.
pub fn parse_datetime(
    s: &str,
    tzid: Option<&str>,
    line: usize,
    col: usize,
) -> ParseResult<DateTime> {
    let err =
        || ParseError::new(ParseErrorKind::InvalidDateTime, line, col).with_context(s.to_string());

    let (date_part, time_part) = s.split_once('T').ok_or_else(err)?;
    let date = parse_date(date_part, line, col)?;

    let (time_part, is_utc) = match time_part.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (time_part, false),
    };
    if time_part.len() != 6 || !all_digits(time_part) {
        return Err(ParseError::new(ParseErrorKind::InvalidTime, line, col + 9));
    }
    let hour = time_part[0..2].parse::<u8>().ok().ok_or_else(err)?;
    let minute = time_part[2..4].parse::<u8>().ok().ok_or_else(err)?;
    let second = time_part[4..6].parse::<u8>().ok().ok_or_else(err)?;
    if hour > 23 || minute > 59 || second > 60 {
        return Err(ParseError::new(ParseErrorKind::InvalidTime, line, col + 9));
    }

    let form = match (is_utc, tzid) {
        (true, _) => DateTimeForm::Utc,
        (false, Some(tzid)) => DateTimeForm::Zoned {
            tzid: tzid.to_string(),
        },
        (false, None) => DateTimeForm::Floating,
    };

    Ok(DateTime::with_form(date, (hour, minute, second), form))
}

/// Parses a UTC-OFFSET value (RFC 5545 §3.3.14), e.g. `+0530` or `-080000`.
///
/// ## Errors
/// Returns an error if the string is not a valid UTC offset.
pub fn parse_utc_offset(s: &str, line: usize, col: usize) -> ParseResult<UtcOffset> {
    let err = || ParseError::new(ParseErrorKind::InvalidUtcOffset, line, col);
    let s = s.trim();

    let (sign, digits) = match s.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(err()),
    };
    if !(digits.len() == 4 || digits.len() == 6) || !all_digits(digits) {
        return Err(err());
    }

    let hours = digits[0..2].parse::<i32>().ok().ok_or_else(err)?;
    let minutes = digits[2..4].parse::<i32>().ok().ok_or_else(err)?;
    let seconds = digits
        .get(4..6)
        .map_or(Ok(0), str::parse::<i32>)
        .ok()
        .ok_or_else(err)?;

    Ok(UtcOffset::from_seconds(
        sign * (hours * 3600 + minutes * 60 + seconds),
    ))
}

/// Parses a DURATION value (RFC 5545 §3.3.6), e.g. `P1W`, `-PT15M`, `P1DT2H`.
///
/// ## Errors
/// Returns an error if the string is not a valid duration.
pub fn parse_duration(s: &str, line: usize, col: usize) -> ParseResult<Duration> {
    let err =
        || ParseError::new(ParseErrorKind::InvalidDuration, line, col).with_context(s.to_string());

    let (negative, unsigned) = match s.split_at_checked(1) {
        Some(("-", rest)) => (true, rest),
        Some(("+", rest)) => (false, rest),
        _ => (false, s),
    };
    let body = unsigned.strip_prefix('P').ok_or_else(err)?;

    let mut duration = Duration {
        negative,
        ..Duration::default()
    };
    let mut in_time = false;
    let mut seen_component = false;
    let mut digits = String::new();

    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' && !in_time && digits.is_empty() {
            in_time = true;
            continue;
        }

        let n = digits.parse::<u32>().ok().ok_or_else(err)?;
        digits.clear();
        match (c, in_time) {
            ('W', false) => duration.weeks = n,
            ('D', false) => duration.days = n,
            ('H', true) => duration.hours = n,
            ('M', true) => duration.minutes = n,
            ('S', true) => duration.seconds = n,
            _ => return Err(err()),
        }
        seen_component = true;
    }

    if !seen_component || !digits.is_empty() {
        return Err(err());
    }
    Ok(duration)
}

/// Unescapes a TEXT value (RFC 5545 §3.3.11): `\\`, `\,`, `\;`, `\n`, `\N`.
///
/// An unknown escape is preserved as written.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(',') => result.push(','),
            Some(';') => result.push(';'),
            Some('\\') | None => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
        }
    }

    result
}

/// Splits a comma separated TEXT list on unescaped commas and unescapes each
/// entry.
#[must_use]
pub fn split_text_list(s: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            entries.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    entries.push(unescape_text(&current));

    entries
}
