pub mod keys;
pub mod object;
pub mod text_match;
pub mod timezone;
