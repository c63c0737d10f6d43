//! iCalendar serialization (RFC 5545).

mod serializer;

pub use serializer::{escape_text, fold_line, serialize, serialize_component, serialize_property};
