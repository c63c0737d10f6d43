//! iCalendar core models (RFC 5545).
//!
//! Unknown properties and parameters are preserved, and every property keeps
//! its raw value next to the typed one so a component serializes back to the
//! text it was read from.

mod component;
mod property;
mod value;

pub use component::{Component, ComponentKind, ICalendar};
pub use property::{ContentLine, Parameter, Property};
pub use value::{Date, DateTime, DateTimeForm, Duration, UtcOffset, Value};
