//! Timezone resolution and UTC conversion for iCalendar date-times.
//!
//! Uses ICU4X for Windows timezone ID to IANA mapping and timezone canonicalization.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::vtimezone::{VTimezone, VTimezoneError};
use crate::rfc::ical::core::{self, DateTimeForm, ICalendar};

/// Error during timezone conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Unknown or invalid timezone identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Invalid datetime value.
    #[error("Invalid datetime: {0}")]
    InvalidDateTime(String),
}

/// A secondary place to look up VTIMEZONE definitions by TZID, consulted
/// after the definitions registered on the resolver itself.
pub trait TimezoneSource {
    fn find_vtimezone(&mut self, tzid: &str) -> Option<Arc<VTimezone>>;
}

/// Resolver for timezone identifiers.
///
/// Lookup order for a TZID: registered VTIMEZONEs, then the attached
/// [`TimezoneSource`], then the IANA database. A TZID none of them knows
/// converts in the fallback zone, as do floating times and DATE values.
pub struct TimeZoneResolver<'s> {
    /// Cache of resolved IANA timezones by TZID.
    cache: HashMap<String, Tz>,
    /// VTIMEZONE definitions by TZID.
    vtimezones: HashMap<String, Arc<VTimezone>>,
    source: Option<&'s mut dyn TimezoneSource>,
    fallback: Tz,
}

/// ## Summary
/// Builds a `TimeZoneResolver` with the document's `VTIMEZONE` components
/// registered.
///
/// ## Errors
/// Returns an error if any `VTIMEZONE` component is invalid.
pub fn build_timezone_resolver(
    ical: &ICalendar,
    fallback: Tz,
) -> Result<TimeZoneResolver<'static>, VTimezoneError> {
    let mut resolver = TimeZoneResolver::new(fallback);

    for tz_component in ical.timezones() {
        let vtimezone = VTimezone::parse(tz_component)?;
        resolver.register_vtimezone(Arc::new(vtimezone));
    }

    Ok(resolver)
}

impl<'s> TimeZoneResolver<'s> {
    #[must_use]
    pub fn new(fallback: Tz) -> Self {
        Self {
            cache: HashMap::new(),
            vtimezones: HashMap::new(),
            source: None,
            fallback,
        }
    }

    /// Creates a resolver that consults `source` for TZIDs without a
    /// registered definition.
    #[must_use]
    pub fn with_source(source: &'s mut dyn TimezoneSource, fallback: Tz) -> Self {
        Self {
            source: Some(source),
            ..Self::new(fallback)
        }
    }

    /// The zone used for floating times, DATE values and unknown TZIDs.
    #[must_use]
    pub const fn fallback(&self) -> Tz {
        self.fallback
    }

    /// ## Summary
    /// Registers a parsed VTIMEZONE component for use by this resolver.
    ///
    /// This allows custom/proprietary timezones defined in iCalendar data
    /// to be used for datetime conversion.
    pub fn register_vtimezone(&mut self, vtimezone: Arc<VTimezone>) {
        self.vtimezones.insert(vtimezone.tzid.clone(), vtimezone);
    }

    #[must_use]
    pub fn has_vtimezone(&self, tzid: &str) -> bool {
        self.vtimezones.contains_key(tzid)
    }

    /// Finds a definition for `tzid`, remembering what the source returns.
    fn find_vtimezone(&mut self, tzid: &str) -> Option<Arc<VTimezone>> {
        if let Some(found) = self.vtimezones.get(tzid) {
            return Some(Arc::clone(found));
        }

        let found = self.source.as_mut()?.find_vtimezone(tzid)?;
        self.vtimezones.insert(tzid.to_string(), Arc::clone(&found));
        Some(found)
    }

    /// ## Summary
    /// Resolves a timezone identifier to a `chrono_tz::Tz`.
    ///
    /// Common CalDAV/iCalendar TZIDs are mapped to their IANA equivalents.
    ///
    /// ## Errors
    ///
    /// Returns `ConversionError::UnknownTimezone` if the TZID cannot be resolved.
    ///
    /// ## Side Effects
    ///
    /// Caches successful resolutions to avoid repeated parsing.
    pub fn resolve(&mut self, tzid: &str) -> Result<Tz, ConversionError> {
        if let Some(tz) = self.cache.get(tzid) {
            return Ok(*tz);
        }

        let normalized = normalize_tzid(tzid);
        let tz = Tz::from_str(&normalized)
            .map_err(|_e| ConversionError::UnknownTimezone(tzid.to_string()))?;

        self.cache.insert(tzid.to_string(), tz);

        Ok(tz)
    }

    /// ## Summary
    /// Converts a local wall-clock time to UTC.
    ///
    /// `None` means a floating time. A TZID that resolves nowhere is treated
    /// like a floating time.
    pub fn local_to_utc(&mut self, local: NaiveDateTime, tzid: Option<&str>) -> DateTime<Utc> {
        let Some(tzid) = tzid else {
            return lenient_from_local(self.fallback, local);
        };

        if let Some(vtimezone) = self.find_vtimezone(tzid) {
            return vtimezone.to_utc(local).and_utc();
        }

        match self.resolve(tzid) {
            Ok(tz) => lenient_from_local(tz, local),
            Err(err) => {
                tracing::debug!(tzid, error = %err, fallback = %self.fallback, "Using fallback timezone");
                lenient_from_local(self.fallback, local)
            }
        }
    }

    /// ## Summary
    /// Converts an iCalendar DATE-TIME to UTC.
    ///
    /// ## Errors
    ///
    /// Returns `ConversionError::InvalidDateTime` if the value is not a real
    /// calendar time.
    pub fn datetime_to_utc(&mut self, dt: &core::DateTime) -> Result<DateTime<Utc>, ConversionError> {
        let local = dt
            .to_naive()
            .ok_or_else(|| ConversionError::InvalidDateTime(dt.to_string()))?;

        Ok(match &dt.form {
            DateTimeForm::Utc => local.and_utc(),
            DateTimeForm::Floating => self.local_to_utc(local, None),
            DateTimeForm::Zoned { tzid } => self.local_to_utc(local, Some(tzid)),
        })
    }

    /// ## Summary
    /// Converts an iCalendar DATE to the UTC instant of its local midnight in
    /// the fallback zone.
    ///
    /// ## Errors
    ///
    /// Returns `ConversionError::InvalidDateTime` if the value is not a real
    /// calendar date.
    pub fn date_to_utc(&mut self, date: core::Date) -> Result<DateTime<Utc>, ConversionError> {
        let local = date
            .to_naive()
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .ok_or_else(|| ConversionError::InvalidDateTime(date.to_string()))?;
        Ok(self.local_to_utc(local, None))
    }
}

/// Maps a local time to UTC without failing.
///
/// A time inside a DST gap is shifted forward one hour; a time inside a fold
/// takes the earlier instant.
fn lenient_from_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(local + chrono::Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => local.and_utc(),
        },
    }
}

/// Normalizes common CalDAV/iCalendar timezone identifiers to IANA names.
///
/// Uses ICU4X for Windows timezone ID mapping and IANA canonicalization.
/// Many calendar clients use non-standard TZID values that need to be
/// mapped to standard IANA timezone names.
#[must_use]
pub fn normalize_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);

    let windows_parser = WindowsParser::new();
    if let Some(tz) = windows_parser.parse(stripped, None) {
        let iana_parser = IanaParserExtended::new();
        for entry in iana_parser.iter() {
            if entry.time_zone == tz {
                return entry.canonical.to_string();
            }
        }
    }

    // Handles aliases like Europe/Kiev -> Europe/Kyiv
    let iana_parser = IanaParserExtended::new();
    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone != icu::time::TimeZone::UNKNOWN {
        return parsed.canonical.to_string();
    }

    stripped.to_string()
}
