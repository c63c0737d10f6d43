//! iCalendar document parser (RFC 5545).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{parse_content_line, split_lines};
use super::values::{
    parse_date, parse_datetime, parse_duration, parse_utc_offset, split_text_list, unescape_text,
};
use crate::rfc::ical::core::{Component, ComponentKind, ContentLine, ICalendar, Property, Value};

/// Parses a complete iCalendar document rooted at VCALENDAR.
///
/// ## Errors
///
/// Returns an error if the text is not well-formed or its root is not
/// VCALENDAR.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse(input: &str) -> ParseResult<ICalendar> {
    tracing::debug!("Parsing iCalendar document");

    let root = parse_root(input)?;
    if root.kind != ComponentKind::Calendar {
        tracing::warn!(root = %root.name, "Root component is not VCALENDAR");
        return Err(
            ParseError::new(ParseErrorKind::MissingBegin, 1, 1).with_context("expected VCALENDAR")
        );
    }

    Ok(ICalendar { root })
}

/// Parses a single component of any kind, e.g. a bare
/// `BEGIN:VEVENT ... END:VEVENT` block.
///
/// ## Errors
///
/// Returns an error if the text is not exactly one well-formed component.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_component(input: &str) -> ParseResult<Component> {
    parse_root(input)
}

fn parse_root(input: &str) -> ParseResult<Component> {
    let content_lines: Vec<(usize, ContentLine)> = split_lines(input)
        .into_iter()
        .map(|(line_num, line)| parse_content_line(&line, line_num).map(|cl| (line_num, cl)))
        .collect::<ParseResult<_>>()?;

    tracing::trace!(count = content_lines.len(), "Parsed content lines");

    let mut iter = content_lines.into_iter();
    let (line_num, begin) = iter
        .next()
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin, 1, 1))?;
    if begin.name != "BEGIN" {
        return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1));
    }

    let root = read_component(&mut iter, line_num, &begin.raw_value)?;

    if let Some((extra_line, cl)) = iter.next() {
        return Err(
            ParseError::new(ParseErrorKind::TrailingContent, extra_line, 1).with_context(cl.name)
        );
    }

    Ok(root)
}

/// Reads properties and children up to the END matching `name`.
fn read_component(
    iter: &mut impl Iterator<Item = (usize, ContentLine)>,
    begin_line: usize,
    name: &str,
) -> ParseResult<Component> {
    let mut component = Component::named(name);
    let mut last_line = begin_line;

    loop {
        let Some((line_num, content_line)) = iter.next() else {
            return Err(ParseError::new(ParseErrorKind::MissingEnd, last_line, 1)
                .with_context(format!("missing END:{}", component.name)));
        };
        last_line = line_num;

        match content_line.name.as_str() {
            "BEGIN" => {
                let child = read_component(iter, line_num, &content_line.raw_value)?;
                component.children.push(child);
            }
            "END" => {
                if !content_line.raw_value.eq_ignore_ascii_case(&component.name) {
                    return Err(
                        ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                            .with_context(format!(
                                "expected END:{}, got END:{}",
                                component.name, content_line.raw_value
                            )),
                    );
                }
                return Ok(component);
            }
            _ => component.properties.push(parse_property(content_line, line_num)),
        }
    }
}

/// Resolves the value type of a content line.
///
/// A value that does not parse as its type is kept as [`Value::Unknown`], so
/// a bad DTSTAMP or DTSTART never makes the whole component unreadable.
fn parse_property(cl: ContentLine, line_num: usize) -> Property {
    let value_type = determine_value_type(&cl);
    let tzid = cl.param_value("TZID");

    let value = parse_value(&cl.raw_value, value_type, tzid, line_num).unwrap_or_else(|err| {
        tracing::debug!(property = %cl.name, error = %err, "Keeping unparseable value as unknown");
        Value::Unknown(cl.raw_value.clone())
    });

    Property {
        name: cl.name,
        params: cl.params,
        value,
        raw_value: cl.raw_value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Date,
    DateTime,
    Duration,
    Integer,
    Recur,
    Text,
    TextList,
    Uri,
    UtcOffset,
    Unknown,
}

fn looks_like_date(raw: &str) -> bool {
    raw.split(',').all(|v| v.len() == 8 && !v.contains('T'))
}

fn determine_value_type(cl: &ContentLine) -> ValueType {
    if let Some(explicit) = cl.param_value("VALUE") {
        return match explicit.to_ascii_uppercase().as_str() {
            "DATE" => ValueType::Date,
            "DATE-TIME" => ValueType::DateTime,
            "DURATION" => ValueType::Duration,
            "INTEGER" => ValueType::Integer,
            "RECUR" => ValueType::Recur,
            "TEXT" => ValueType::Text,
            "URI" | "CAL-ADDRESS" => ValueType::Uri,
            "UTC-OFFSET" => ValueType::UtcOffset,
            _ => ValueType::Unknown,
        };
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DTSTAMP" | "CREATED" | "LAST-MODIFIED" | "COMPLETED" | "DUE"
        | "RECURRENCE-ID" | "EXDATE" | "RDATE" => {
            if looks_like_date(&cl.raw_value) {
                ValueType::Date
            } else if cl.raw_value.contains('/') {
                ValueType::Unknown
            } else {
                ValueType::DateTime
            }
        }
        "DURATION" => ValueType::Duration,
        "TRIGGER" => {
            if cl.raw_value.starts_with(['P', '-', '+']) {
                ValueType::Duration
            } else {
                ValueType::DateTime
            }
        }
        "PERCENT-COMPLETE" | "PRIORITY" | "REPEAT" | "SEQUENCE" => ValueType::Integer,
        "RRULE" | "EXRULE" => ValueType::Recur,
        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,
        "ATTENDEE" | "ORGANIZER" | "URL" | "TZURL" | "SOURCE" => ValueType::Uri,
        "CATEGORIES" | "RESOURCES" => ValueType::TextList,
        _ => ValueType::Text,
    }
}

fn parse_value(
    raw: &str,
    value_type: ValueType,
    tzid: Option<&str>,
    line_num: usize,
) -> ParseResult<Value> {
    Ok(match value_type {
        ValueType::Text => Value::Text(unescape_text(raw)),
        ValueType::TextList => Value::TextList(split_text_list(raw)),
        ValueType::Date if raw.contains(',') => Value::DateList(
            raw.split(',')
                .map(|s| parse_date(s.trim(), line_num, 1))
                .collect::<ParseResult<_>>()?,
        ),
        ValueType::Date => Value::Date(parse_date(raw, line_num, 1)?),
        ValueType::DateTime if raw.contains(',') => Value::DateTimeList(
            raw.split(',')
                .map(|s| parse_datetime(s.trim(), tzid, line_num, 1))
                .collect::<ParseResult<_>>()?,
        ),
        ValueType::DateTime => Value::DateTime(parse_datetime(raw, tzid, line_num, 1)?),
        ValueType::Duration => Value::Duration(parse_duration(raw, line_num, 1)?),
        ValueType::Integer => Value::Integer(raw.trim().parse::<i32>().map_err(|e| {
            ParseError::new(ParseErrorKind::InvalidInteger, line_num, 1).with_context(e.to_string())
        })?),
        ValueType::UtcOffset => Value::UtcOffset(parse_utc_offset(raw, line_num, 1)?),
        ValueType::Recur => Value::Recur(raw.to_string()),
        ValueType::Uri => Value::Uri(raw.to_string()),
        ValueType::Unknown => Value::Unknown(raw.to_string()),
    })
}
