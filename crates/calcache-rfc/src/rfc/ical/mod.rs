//! iCalendar (RFC 5545) support for the component cache.
//!
//! - `core`: component, property and value types
//! - `parse`: text to components
//! - `build`: components to text
//! - `expand`: timezone resolution and UTC conversion

pub mod build;
pub mod core;
pub mod expand;
pub mod parse;

pub use build::{serialize, serialize_component};
pub use core::{Component, ComponentKind, ICalendar, Parameter, Property, Value};
pub use parse::{ParseError, ParseResult, parse, parse_component};
