//! Behaviour tests for the calendar cache against real cache files.

mod helpers;

mod components;
mod lifecycle;
mod offline;
mod ranges;
mod search;
mod timezones;
