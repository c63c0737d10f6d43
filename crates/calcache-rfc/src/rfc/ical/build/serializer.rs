//! iCalendar serializer (RFC 5545).
//!
//! Properties and children are written in the order they are stored, so a
//! parsed component serializes back to the same content it was read from.

use crate::rfc::ical::core::{Component, ICalendar, Parameter, Property, Value};

/// Maximum line length in octets, not including CRLF.
const MAX_LINE_OCTETS: usize = 75;

/// Serializes an iCalendar document to a string.
#[must_use]
pub fn serialize(ical: &ICalendar) -> String {
    serialize_component(&ical.root)
}

/// Serializes a component and all of its children.
#[must_use]
pub fn serialize_component(component: &Component) -> String {
    let mut out = String::new();
    write_component(&mut out, component);
    out
}

fn write_component(out: &mut String, component: &Component) {
    out.push_str(&fold_line(&format!("BEGIN:{}", component.name)));
    for prop in &component.properties {
        out.push_str(&serialize_property(prop));
    }
    for child in &component.children {
        write_component(out, child);
    }
    out.push_str(&fold_line(&format!("END:{}", component.name)));
}

/// Serializes one property as a folded, CRLF-terminated content line.
#[must_use]
pub fn serialize_property(prop: &Property) -> String {
    let mut line = prop.name.clone();

    for param in &prop.params {
        line.push(';');
        write_parameter(&mut line, param);
    }
    line.push(':');

    match &prop.value {
        Value::Text(text) => line.push_str(&escape_text(text)),
        Value::TextList(list) => {
            let escaped: Vec<String> = list.iter().map(|s| escape_text(s)).collect();
            line.push_str(&escaped.join(","));
        }
        _ => line.push_str(&prop.raw_value),
    }

    fold_line(&line)
}

fn write_parameter(out: &mut String, param: &Parameter) {
    out.push_str(&param.name);
    out.push('=');
    for (i, value) in param.values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains([':', ';', ',', '"', '\n']) {
            let encoded = value
                .replace('^', "^^")
                .replace('\n', "^n")
                .replace('"', "^'");
            out.push('"');
            out.push_str(&encoded);
            out.push('"');
        } else {
            out.push_str(value);
        }
    }
}

/// Escapes a TEXT value (RFC 5545 §3.3.11).
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            ',' => result.push_str("\\,"),
            ';' => result.push_str("\\;"),
            '\n' => result.push_str("\\n"),
            '\r' => {}
            _ => result.push(c),
        }
    }
    result
}

/// Folds a content line at 75 octets and terminates it with CRLF.
///
/// Continuation lines start with a single space and never split a UTF-8
/// sequence.
#[must_use]
pub fn fold_line(line: &str) -> String {
    let mut result = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3 + 2);
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;

    for c in line.chars() {
        let width = c.len_utf8();
        if used + width > budget {
            result.push_str("\r\n ");
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        result.push(c);
        used += width;
    }
    result.push_str("\r\n");

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{ComponentKind, Parameter};
    use crate::rfc::ical::parse::{parse, parse_component};

    #[test_log::test]
    fn fold_respects_octet_limit_and_utf8() {
        let long = format!("SUMMARY:{}", "é".repeat(60));
        let folded = fold_line(&long);
        for segment in folded.split("\r\n").filter(|s| !s.is_empty()) {
            assert!(segment.len() <= MAX_LINE_OCTETS, "{segment:?}");
        }
        let unfolded = folded.replace("\r\n ", "");
        assert_eq!(unfolded, format!("{long}\r\n"));
    }

    #[test_log::test]
    fn short_line_is_not_folded() {
        assert_eq!(fold_line("UID:x"), "UID:x\r\n");
    }

    #[test_log::test]
    fn property_escaping_and_param_quoting() {
        let prop = Property::cal_address("ATTENDEE", "mailto:a@x.com", Some("Doe; Jane"))
            .with_param(Parameter::new("X-NOTE", "line1\nline2"));
        assert_eq!(
            serialize_property(&prop),
            "ATTENDEE;CN=\"Doe; Jane\";X-NOTE=\"line1^nline2\":mailto:a@x.com\r\n"
        );

        let summary = Property::text("SUMMARY", "a, b; c\nd");
        assert_eq!(serialize_property(&summary), "SUMMARY:a\\, b\\; c\\nd\r\n");
    }

    #[test_log::test]
    fn parse_serialize_parse_is_stable() {
        let input = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:round-trip\r\n\
DTSTART;TZID=Europe/Berlin:20260301T100000\r\n\
SUMMARY:Caf\u{e9}\\, lunch\r\n\
CATEGORIES:Food,Friends\\, old\r\n\
X-CUSTOM;X-PARAM=1:keep me\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let first = parse(input).unwrap();
        let text = serialize(&first);
        assert_eq!(text, input);
        assert_eq!(parse(&text).unwrap(), first);
    }

    #[test_log::test]
    fn bare_component_round_trip() {
        let text = "BEGIN:VTODO\r\nUID:t\r\nSTATUS:NEEDS-ACTION\r\nEND:VTODO\r\n";
        let todo = parse_component(text).unwrap();
        assert_eq!(todo.kind, ComponentKind::Todo);
        assert_eq!(serialize_component(&todo), text);
    }
}
