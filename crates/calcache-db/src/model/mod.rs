pub mod object;
pub mod timezone;
