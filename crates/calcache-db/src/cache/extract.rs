//! Derived columns computed from a component on every write.

use chrono::{DateTime, Utc};
use rrule::{RRule, Unvalidated};

use calcache_rfc::rfc::ical::core::{Component, ComponentKind, Property, Value};
use calcache_rfc::rfc::ical::expand::TimeZoneResolver;
use calcache_rfc::rfc::ical::parse::{parse_date, parse_datetime, parse_duration};

use crate::db::query::text_match::decompose_text;
use crate::model::object::ColumnValues;

/// Format of every time column: UTC, fixed width, so that string order is
/// time order.
pub const TIME_COLUMN_FORMAT: &str = "%Y%m%d%H%M%S";

#[must_use]
pub fn encode_utc(time: DateTime<Utc>) -> String {
    time.format(TIME_COLUMN_FORMAT).to_string()
}

/// ## Summary
/// Computes every derived column of `component`.
///
/// Times referencing a TZID are converted through `resolver`; anything it
/// cannot place is read in the resolver's fallback zone. Missing or unusable
/// properties leave their column empty.
#[must_use]
pub fn extract(component: &Component, resolver: &mut TimeZoneResolver<'_>) -> ColumnValues {
    let (occur_start, occur_end) = occurrence_bounds(component, resolver);

    ColumnValues {
        occur_start: occur_start.map(encode_utc),
        occur_end: occur_end.map(encode_utc),
        due: component
            .get_property("DUE")
            .and_then(|p| property_to_utc(p, resolver))
            .map(encode_utc),
        completed: component.get_property("COMPLETED").and_then(raw_time_digits),
        summary: component.summary().and_then(decompose_text),
        comment: joined_text(component, "COMMENT"),
        description: joined_text(component, "DESCRIPTION"),
        location: component
            .get_property("LOCATION")
            .and_then(Property::as_text)
            .and_then(decompose_text),
        attendees: attendees(component),
        organizer: component.get_property("ORGANIZER").and_then(address_entry),
        classification: classification(component).map(str::to_string),
        status: status(component).map(str::to_string),
        priority: component
            .get_property("PRIORITY")
            .and_then(Property::as_integer)
            .filter(|p| *p != 0),
        categories: categories(component),
        has_alarm: component.alarms().next().is_some(),
        has_start: component
            .get_property("DTSTART")
            .is_some_and(|p| raw_time_digits(p).is_some()),
        has_recurrences: has_recurrences(component),
    }
}

/// True for a recurring master and for a detached instance.
#[must_use]
pub fn has_recurrences(component: &Component) -> bool {
    component.has_property("RRULE")
        || component.has_property("RDATE")
        || component.recurrence_id().is_some()
}

/// ## Summary
/// Returns the earliest start and latest end of all occurrences.
///
/// A component without a usable DTSTART has neither bound. An end of `None`
/// means the component never stops recurring, or is a task without DUE or
/// COMPLETED.
fn occurrence_bounds(
    component: &Component,
    resolver: &mut TimeZoneResolver<'_>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let Some(dtstart) = component.get_property("DTSTART") else {
        return (None, None);
    };
    let Some(start) = property_to_utc(dtstart, resolver) else {
        tracing::debug!(uid = ?component.uid(), raw = %dtstart.raw_value, "DTSTART is not a usable time");
        return (None, None);
    };

    let end = if component.kind == ComponentKind::Todo {
        todo_end(component, resolver)
    } else {
        let duration = event_duration(component, dtstart, start, resolver);
        if component.has_property("RRULE") || component.has_property("RDATE") {
            recurrence_end(component, dtstart, start, duration, resolver)
        } else {
            Some(start + duration)
        }
    };

    (Some(start), end.map(|end| end.max(start)))
}

/// The later of DUE and COMPLETED.
fn todo_end(component: &Component, resolver: &mut TimeZoneResolver<'_>) -> Option<DateTime<Utc>> {
    let due = component
        .get_property("DUE")
        .and_then(|p| property_to_utc(p, resolver));
    let completed = component
        .get_property("COMPLETED")
        .and_then(|p| property_to_utc(p, resolver));
    due.max(completed)
}

/// Length of one occurrence: DTEND, then DURATION, then one day for an
/// all-day start, else zero.
fn event_duration(
    component: &Component,
    dtstart: &Property,
    start: DateTime<Utc>,
    resolver: &mut TimeZoneResolver<'_>,
) -> chrono::Duration {
    if let Some(end) = component
        .get_property("DTEND")
        .and_then(|p| property_to_utc(p, resolver))
    {
        return (end - start).max(chrono::Duration::zero());
    }

    if let Some(duration) = component
        .get_property("DURATION")
        .and_then(Property::as_duration)
    {
        return duration.to_chrono().max(chrono::Duration::zero());
    }

    if dtstart.as_date().is_some() {
        chrono::Duration::days(1)
    } else {
        chrono::Duration::zero()
    }
}

enum RuleEnd {
    Unbounded,
    Last(DateTime<Utc>),
    Empty,
}

fn recurrence_end(
    component: &Component,
    dtstart: &Property,
    start: DateTime<Utc>,
    duration: chrono::Duration,
    resolver: &mut TimeZoneResolver<'_>,
) -> Option<DateTime<Utc>> {
    let mut end = start + duration;

    let excluded = exdates(component, resolver);
    for rule in component.get_properties("RRULE") {
        match last_rule_occurrence(rule, dtstart, start, &excluded, resolver) {
            RuleEnd::Unbounded => return None,
            RuleEnd::Last(last) => end = end.max(last + duration),
            RuleEnd::Empty => {}
        }
    }

    for rdate in component.get_properties("RDATE") {
        for (instant, period_end) in rdate_values(rdate, resolver) {
            end = end.max(period_end.unwrap_or(instant + duration));
        }
    }

    Some(end)
}

/// Expands `rule` from `start` and returns its last non-excluded occurrence.
fn last_rule_occurrence(
    rule: &Property,
    dtstart: &Property,
    start: DateTime<Utc>,
    excluded: &[DateTime<Utc>],
    resolver: &mut TimeZoneResolver<'_>,
) -> RuleEnd {
    let upper = rule.raw_value.to_ascii_uppercase();
    if !upper.contains("COUNT=") && !upper.contains("UNTIL=") {
        return RuleEnd::Unbounded;
    }

    let tzid = dtstart.as_datetime().and_then(|dt| dt.tzid());
    let zone = match (dtstart.as_datetime(), tzid) {
        (Some(dt), _) if dt.is_utc() => Some(chrono_tz::UTC),
        (_, Some(tzid)) if !resolver.has_vtimezone(tzid) => resolver.resolve(tzid).ok(),
        (_, Some(_)) => None,
        (_, None) => Some(resolver.fallback()),
    };

    let occurrences: Vec<DateTime<Utc>> = match zone {
        Some(zone) => {
            let anchor = start.with_timezone(&rrule::Tz::Tz(zone));
            match expand_rule(&rule.raw_value, anchor) {
                Some(dates) => dates.iter().map(|d| d.with_timezone(&Utc)).collect(),
                None => return RuleEnd::Unbounded,
            }
        }
        None => {
            // Zone only known through a VTIMEZONE: expand on the wall clock,
            // then apply a UTC UNTIL to the converted instants.
            let Some(local) = dtstart.as_datetime().and_then(|dt| dt.to_naive()) else {
                return RuleEnd::Unbounded;
            };
            let anchor = local.and_utc().with_timezone(&rrule::Tz::UTC);
            let (text, until) = relax_utc_until(&rule.raw_value);
            match expand_rule(&text, anchor) {
                Some(dates) => dates
                    .iter()
                    .map(|d| resolver.local_to_utc(d.naive_utc(), tzid))
                    .filter(|instant| until.is_none_or(|until| *instant <= until))
                    .collect(),
                None => return RuleEnd::Unbounded,
            }
        }
    };

    occurrences
        .into_iter()
        .filter(|o| !excluded.contains(o))
        .max()
        .map_or(RuleEnd::Empty, RuleEnd::Last)
}

/// Widest UTC offset in use, in hours.
const MAX_UTC_OFFSET_HOURS: i64 = 14;

/// ## Summary
/// Pushes a UTC `UNTIL` of `rule` out by the widest UTC offset so that a
/// wall-clock expansion cannot cut off its last occurrence.
///
/// Returns the rewritten rule and the original `UNTIL` instant, or the rule
/// unchanged and `None` when it has no UTC `UNTIL`.
fn relax_utc_until(rule: &str) -> (String, Option<DateTime<Utc>>) {
    let mut until = None;
    let parts: Vec<String> = rule
        .split(';')
        .map(|part| {
            let Some((name, value)) = part.split_once('=') else {
                return part.to_string();
            };
            if !name.trim().eq_ignore_ascii_case("UNTIL") {
                return part.to_string();
            }
            match chrono::NaiveDateTime::parse_from_str(value.trim(), "%Y%m%dT%H%M%SZ") {
                Ok(parsed) => {
                    let parsed = parsed.and_utc();
                    until = Some(parsed);
                    let relaxed = parsed + chrono::Duration::hours(MAX_UTC_OFFSET_HOURS);
                    format!("{name}={}", relaxed.format("%Y%m%dT%H%M%SZ"))
                }
                Err(_) => part.to_string(),
            }
        })
        .collect();
    (parts.join(";"), until)
}

/// Returns every occurrence of a bounded rule, or `None` if the rule is
/// unusable or too long to expand.
fn expand_rule(text: &str, anchor: DateTime<rrule::Tz>) -> Option<Vec<DateTime<rrule::Tz>>> {
    let built = text
        .parse::<RRule<Unvalidated>>()
        .map_err(|err| err.to_string())
        .and_then(|rule| rule.build(anchor).map_err(|err| err.to_string()));

    match built {
        Ok(set) => {
            let result = set.all(u16::MAX);
            if result.limited {
                tracing::debug!(rule = %text, "Recurrence too long to expand, treating as unbounded");
                return None;
            }
            Some(result.dates)
        }
        Err(err) => {
            tracing::debug!(rule = %text, error = %err, "Ignoring unusable RRULE");
            None
        }
    }
}

fn exdates(component: &Component, resolver: &mut TimeZoneResolver<'_>) -> Vec<DateTime<Utc>> {
    component
        .get_properties("EXDATE")
        .flat_map(|p| rdate_values(p, resolver))
        .map(|(instant, _)| instant)
        .collect()
}

/// Reads the instants of an RDATE or EXDATE property, each with the explicit
/// end of a PERIOD value.
fn rdate_values(
    prop: &Property,
    resolver: &mut TimeZoneResolver<'_>,
) -> Vec<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let single = |instant: Option<DateTime<Utc>>| instant.map(|i| (i, None));

    match &prop.value {
        Value::DateTime(dt) => single(resolver.datetime_to_utc(dt).ok()).into_iter().collect(),
        Value::DateTimeList(list) => list
            .iter()
            .filter_map(|dt| single(resolver.datetime_to_utc(dt).ok()))
            .collect(),
        Value::Date(date) => single(resolver.date_to_utc(*date).ok()).into_iter().collect(),
        Value::DateList(list) => list
            .iter()
            .filter_map(|date| single(resolver.date_to_utc(*date).ok()))
            .collect(),
        Value::Unknown(raw) => raw
            .split(',')
            .filter_map(|period| parse_period(period.trim(), prop.get_param_value("TZID"), resolver))
            .collect(),
        _ => Vec::new(),
    }
}

/// Parses `start/end` or `start/duration`.
fn parse_period(
    period: &str,
    tzid: Option<&str>,
    resolver: &mut TimeZoneResolver<'_>,
) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let (start, rest) = period.split_once('/')?;
    let start = resolver
        .datetime_to_utc(&parse_datetime(start, tzid, 1, 1).ok()?)
        .ok()?;

    let end = if rest.starts_with(['P', '+', '-']) {
        start + parse_duration(rest, 1, 1).ok()?.to_chrono()
    } else {
        resolver
            .datetime_to_utc(&parse_datetime(rest, tzid, 1, 1).ok()?)
            .ok()?
    };

    Some((start, Some(end)))
}

fn property_to_utc(prop: &Property, resolver: &mut TimeZoneResolver<'_>) -> Option<DateTime<Utc>> {
    match &prop.value {
        Value::DateTime(dt) => resolver.datetime_to_utc(dt).ok(),
        Value::Date(date) => resolver.date_to_utc(*date).ok(),
        _ => None,
    }
}

/// The time digits as written, without any zone conversion.
fn raw_time_digits(prop: &Property) -> Option<String> {
    match &prop.value {
        Value::DateTime(dt) => dt.to_naive().map(|n| n.format(TIME_COLUMN_FORMAT).to_string()),
        Value::Date(date) => date
            .to_naive()
            .map(|d| format!("{}000000", d.format("%Y%m%d"))),
        Value::Unknown(raw) => parse_date(raw, 1, 1)
            .ok()
            .and_then(|d| d.to_naive())
            .map(|d| format!("{}000000", d.format("%Y%m%d"))),
        _ => None,
    }
}

/// Every value of a repeatable text property, folded and run together.
fn joined_text(component: &Component, name: &str) -> Option<String> {
    let joined: String = component
        .get_properties(name)
        .filter_map(Property::as_text)
        .filter_map(decompose_text)
        .collect();
    (!joined.is_empty()).then_some(joined)
}

pub(super) fn strip_mailto(address: &str) -> &str {
    let trimmed = address.trim();
    match trimmed.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &trimmed[7..],
        _ => trimmed,
    }
}

/// `<cn>\t<mailbox>`, or whichever of the two is present.
fn address_entry(prop: &Property) -> Option<String> {
    let cn = prop.get_param_value("CN").and_then(decompose_text);
    let mailbox = decompose_text(strip_mailto(&prop.raw_value));
    match (cn, mailbox) {
        (Some(cn), Some(mailbox)) => Some(format!("{cn}\t{mailbox}")),
        (cn, mailbox) => cn.or(mailbox),
    }
}

/// `\n<entry>\n<entry>\n`, so each entry can be matched with its delimiters.
fn attendees(component: &Component) -> Option<String> {
    let entries: Vec<String> = component
        .get_properties("ATTENDEE")
        .filter_map(address_entry)
        .collect();
    wrap_lines(&entries)
}

fn categories(component: &Component) -> Option<String> {
    let entries: Vec<&str> = component
        .get_properties("CATEGORIES")
        .flat_map(Property::text_values)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    wrap_lines(&entries)
}

fn wrap_lines<S: AsRef<str>>(entries: &[S]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut out = String::from("\n");
    for entry in entries {
        out.push_str(entry.as_ref());
        out.push('\n');
    }
    Some(out)
}

fn classification(component: &Component) -> Option<&'static str> {
    let class = component.get_property("CLASS")?.as_text()?.trim();
    if class.eq_ignore_ascii_case("PUBLIC") {
        Some("public")
    } else if class.eq_ignore_ascii_case("PRIVATE") {
        Some("private")
    } else if class.eq_ignore_ascii_case("CONFIDENTIAL") {
        Some("confidential")
    } else {
        None
    }
}

/// Maps STATUS to its column token. A component without STATUS has not
/// started.
fn status(component: &Component) -> Option<&'static str> {
    let Some(prop) = component.get_property("STATUS") else {
        return Some("NOT STARTED");
    };
    let value = prop.as_text()?.trim().to_ascii_uppercase();
    Some(match value.as_str() {
        "NEEDS-ACTION" => "NEEDS ACTION",
        "IN-PROCESS" => "IN PROGRESS",
        "COMPLETED" => "COMPLETED",
        "CANCELLED" => "CANCELLED",
        "TENTATIVE" => "TENTATIVE",
        "CONFIRMED" => "CONFIRMED",
        "DRAFT" => "DRAFT",
        "FINAL" => "FINAL",
        "SUBMITTED" => "SUBMITTED",
        "PENDING" => "PENDING",
        "FAILED" => "FAILED",
        _ => return None,
    })
}
