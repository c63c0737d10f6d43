//! Content line lexer for iCalendar (RFC 5545 §3.1).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{ContentLine, Parameter};

/// Splits input into unfolded content lines, tagged with their 1-based line
/// number.
///
/// Accepts CRLF and bare LF. A line starting with SPACE or HTAB continues the
/// previous one; unfolding drops the line break and that single whitespace
/// character. Lines without any `:` are treated as continuations too, which
/// repairs output from clients that fold without the leading whitespace.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let continuation = line
            .strip_prefix([' ', '\t'])
            .or_else(|| (!line.contains(':')).then_some(line));

        match (continuation, lines.last_mut()) {
            (Some(rest), Some((_, previous))) => previous.push_str(rest),
            (Some(rest), None) => lines.push((index + 1, rest.to_string())),
            (None, _) => lines.push((index + 1, line.to_string())),
        }
    }

    lines
}

/// Parses a single unfolded content line.
///
/// Format: `name *(";" param) ":" value`
///
/// ## Errors
/// Returns an error if the name is missing or malformed, a parameter is
/// malformed, or the value separator is missing.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let name_end = line
        .find([';', ':'])
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num, line.len()))?;

    let name = &line[..name_end];
    if name.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MissingPropertyName,
            line_num,
            1,
        ));
    }
    if let Some(bad) = name.find(|c: char| !c.is_ascii_alphanumeric() && c != '-') {
        return Err(ParseError::new(
            ParseErrorKind::InvalidPropertyName,
            line_num,
            bad + 1,
        ));
    }

    let mut params = Vec::new();
    let mut pos = name_end;
    while line[pos..].starts_with(';') {
        let (param, next) = parse_parameter(line, pos + 1, line_num)?;
        params.push(param);
        pos = next;
    }

    if !line[pos..].starts_with(':') {
        return Err(ParseError::new(ParseErrorKind::MissingColon, line_num, pos + 1));
    }

    Ok(ContentLine {
        name: name.to_ascii_uppercase(),
        params,
        raw_value: line[pos + 1..].to_string(),
    })
}

/// Parses `name=value *("," value)` starting at byte `start`.
///
/// Returns the parameter and the byte offset just past its last value.
fn parse_parameter(line: &str, start: usize, line_num: usize) -> ParseResult<(Parameter, usize)> {
    let invalid = |col: usize| ParseError::new(ParseErrorKind::InvalidParameter, line_num, col);

    let eq = line[start..]
        .find('=')
        .map(|offset| start + offset)
        .ok_or_else(|| invalid(start + 1))?;
    let name = &line[start..eq];
    if name.is_empty() || name.contains(|c: char| !c.is_ascii_alphanumeric() && c != '-') {
        return Err(invalid(start + 1));
    }

    let mut values = Vec::new();
    let mut pos = eq + 1;
    loop {
        let (value, next) = parse_param_value(line, pos, line_num)?;
        values.push(value);
        pos = next;
        if !line[pos..].starts_with(',') {
            break;
        }
        pos += 1;
    }

    Ok((Parameter::with_values(name, values), pos))
}

/// Parses one parameter value, quoted or bare, decoding RFC 6868 caret escapes.
fn parse_param_value(line: &str, start: usize, line_num: usize) -> ParseResult<(String, usize)> {
    let rest = &line[start..];

    if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted.find('"').ok_or_else(|| {
            ParseError::new(ParseErrorKind::UnclosedQuote, line_num, start + 1)
        })?;
        return Ok((decode_caret(&quoted[..close]), start + close + 2));
    }

    let end = rest.find([',', ';', ':']).unwrap_or(rest.len());
    if rest[..end].contains('"') {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            start + 1,
        ));
    }
    Ok((decode_caret(&rest[..end]), start + end))
}

fn decode_caret(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '^' {
            decoded.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('\'') => decoded.push('"'),
            Some('^') => decoded.push('^'),
            Some(other) => {
                decoded.push('^');
                decoded.push(other);
            }
            None => decoded.push('^'),
        }
    }
    decoded
}
