//! Timezone definitions and conversion of iCalendar times to UTC.

mod timezone;
mod vtimezone;

pub use timezone::{
    ConversionError, TimeZoneResolver, TimezoneSource, build_timezone_resolver, normalize_tzid,
};
pub use vtimezone::{Observance, ObservanceKind, VTimezone, VTimezoneError};
