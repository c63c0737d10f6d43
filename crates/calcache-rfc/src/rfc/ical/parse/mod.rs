//! iCalendar parsing (RFC 5545).
//!
//! - Lexer: line unfolding and content line tokenizing
//! - Values: DATE, DATE-TIME, DURATION, UTC-OFFSET and TEXT decoding
//! - Parser: documents and bare components

mod error;
mod lexer;
mod parser;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{parse_content_line, split_lines};
pub use parser::{parse, parse_component};
pub use values::{
    parse_date, parse_datetime, parse_duration, parse_utc_offset, split_text_list, unescape_text,
};
