//! VTIMEZONE definitions (RFC 5545 §3.6.5).
//!
//! A parsed [`VTimezone`] answers "which UTC offset applies at this local
//! time" for timezones that are only known through their definition, such as
//! the custom zones Outlook and Lotus Notes emit.

use chrono::NaiveDateTime;
use rrule::{RRule, RRuleSet, Tz, Unvalidated};

use crate::rfc::ical::build::serialize_component;
use crate::rfc::ical::core::{Component, ComponentKind, UtcOffset, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VTimezoneError {
    #[error("Component is {0}, not VTIMEZONE")]
    NotTimezone(String),

    #[error("Missing required TZID property")]
    MissingTzid,

    #[error("VTIMEZONE must have at least one STANDARD or DAYLIGHT component")]
    NoObservances,

    #[error("Missing or invalid {0} in {1} component")]
    MissingProperty(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

impl ObservanceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
        }
    }
}

/// One STANDARD or DAYLIGHT rule.
#[derive(Debug, Clone)]
pub struct Observance {
    pub kind: ObservanceKind,
    pub offset_from: UtcOffset,
    pub offset_to: UtcOffset,
    /// First onset, in the local time of `offset_from`.
    pub dtstart: NaiveDateTime,
    pub rdates: Vec<NaiveDateTime>,
    /// Annual transition rule anchored at `dtstart`, if any.
    rule: Option<RRuleSet>,
}

impl Observance {
    fn parse(component: &Component, kind: ObservanceKind) -> Result<Self, VTimezoneError> {
        let name = kind.as_str();

        let dtstart = component
            .get_property("DTSTART")
            .and_then(|p| p.as_datetime())
            .and_then(crate::rfc::ical::core::DateTime::to_naive)
            .ok_or(VTimezoneError::MissingProperty("DTSTART", name))?;

        let offset = |prop: &'static str| match component.get_property(prop).map(|p| &p.value) {
            Some(Value::UtcOffset(offset)) => Ok(*offset),
            _ => Err(VTimezoneError::MissingProperty(prop, name)),
        };
        let offset_to = offset("TZOFFSETTO")?;
        let offset_from = offset("TZOFFSETFROM")?;

        let rdates = component
            .get_properties("RDATE")
            .flat_map(|p| match &p.value {
                Value::DateTime(dt) => vec![dt.clone()],
                Value::DateTimeList(list) => list.clone(),
                _ => Vec::new(),
            })
            .filter_map(|dt| dt.to_naive())
            .collect();

        let rule = component.get_property("RRULE").and_then(|p| {
            let built = p
                .raw_value
                .parse::<RRule<Unvalidated>>()
                .map_err(|err| err.to_string())
                .and_then(|rule| {
                    rule.build(dtstart.and_utc().with_timezone(&Tz::UTC))
                        .map_err(|err| err.to_string())
                });
            match built {
                Ok(set) => Some(set),
                Err(err) => {
                    tracing::debug!(rule = %p.raw_value, error = %err, "Ignoring unusable observance RRULE");
                    None
                }
            }
        });

        Ok(Self {
            kind,
            offset_from,
            offset_to,
            dtstart,
            rdates,
            rule,
        })
    }

    /// Returns the latest onset at or before `local`, if the observance has
    /// started by then.
    fn latest_onset(&self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        if local < self.dtstart {
            return None;
        }

        let mut best = self.dtstart;
        for rdate in &self.rdates {
            if *rdate <= local && *rdate > best {
                best = *rdate;
            }
        }

        if let Some(rule) = &self.rule {
            let bound = (local + chrono::Duration::seconds(1))
                .and_utc()
                .with_timezone(&Tz::UTC);
            let onsets = rule.clone().before(bound).all(u16::MAX);
            if let Some(last) = onsets.dates.last().map(chrono::DateTime::naive_utc)
                && last <= local
                && last > best
            {
                best = last;
            }
        }

        Some(best)
    }
}

/// A parsed VTIMEZONE, together with the component it came from.
#[derive(Debug, Clone)]
pub struct VTimezone {
    pub tzid: String,
    pub observances: Vec<Observance>,
    component: Component,
}

impl VTimezone {
    /// ## Summary
    /// Parses a VTIMEZONE component.
    ///
    /// ## Errors
    /// Returns an error if the component is not a VTIMEZONE, has no TZID, or
    /// has no usable STANDARD/DAYLIGHT observance.
    pub fn parse(component: &Component) -> Result<Self, VTimezoneError> {
        if component.kind != ComponentKind::Timezone {
            return Err(VTimezoneError::NotTimezone(component.name.clone()));
        }

        let tzid = component
            .get_property("TZID")
            .and_then(|p| p.as_text())
            .filter(|tzid| !tzid.is_empty())
            .ok_or(VTimezoneError::MissingTzid)?
            .to_string();

        let observances = component
            .children
            .iter()
            .filter_map(|child| match child.kind {
                ComponentKind::Standard => Some(Observance::parse(child, ObservanceKind::Standard)),
                ComponentKind::Daylight => Some(Observance::parse(child, ObservanceKind::Daylight)),
                _ => None,
            })
            .collect::<Result<Vec<_>, _>>()?;

        if observances.is_empty() {
            return Err(VTimezoneError::NoObservances);
        }

        Ok(Self {
            tzid,
            observances,
            component: component.clone(),
        })
    }

    /// The VTIMEZONE component this definition was parsed from.
    #[must_use]
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Serializes the definition back to iCalendar text.
    #[must_use]
    pub fn to_ical_string(&self) -> String {
        serialize_component(&self.component)
    }

    /// Returns the UTC offset in effect at a local wall-clock time.
    ///
    /// Before the first onset of any observance, the earliest observance's
    /// `offset_from` applies.
    #[must_use]
    pub fn offset_at(&self, local: NaiveDateTime) -> UtcOffset {
        self.observances
            .iter()
            .filter_map(|obs| obs.latest_onset(local).map(|onset| (onset, obs)))
            .max_by_key(|(onset, _)| *onset)
            .map_or_else(
                || {
                    self.observances
                        .iter()
                        .min_by_key(|obs| obs.dtstart)
                        .map_or(UtcOffset::default(), |obs| obs.offset_from)
                },
                |(_, obs)| obs.offset_to,
            )
    }

    /// Converts a local wall-clock time in this zone to UTC.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.offset_at(local).to_chrono()
    }
}
