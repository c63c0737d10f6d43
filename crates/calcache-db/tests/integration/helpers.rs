#![allow(clippy::expect_used, dead_code)]
//! Test helpers for cache behaviour tests.
//!
//! Each test gets its own cache file inside a temporary directory that is
//! removed when the `TestCache` is dropped.

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use calcache_db::{CalCache, OfflineFlag};
use calcache_rfc::rfc::ical::core::Component;
use calcache_rfc::rfc::ical::parse_component;

pub struct TestCache {
    dir: TempDir,
    pub cache: CalCache,
}

impl TestCache {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let cache = CalCache::open(&dir.path().join("cache.db"), chrono_tz::UTC)
            .expect("Failed to open cache");
        Self { dir, cache }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("cache.db")
    }

    /// Closes the cache and opens the same file again.
    pub fn reopen(self) -> Self {
        let Self { dir, cache } = self;
        drop(cache);
        let cache = CalCache::open(&dir.path().join("cache.db"), chrono_tz::UTC)
            .expect("Failed to reopen cache");
        Self { dir, cache }
    }

    pub fn put(&self, component: &Component) {
        self.cache
            .put_component(component, None, OfflineFlag::Online, None)
            .expect("Failed to put component");
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .expect("valid test time")
}

/// Parses a component from lines joined with CRLF.
pub fn component(lines: &[&str]) -> Component {
    let mut text = lines.join("\r\n");
    text.push_str("\r\n");
    parse_component(&text).expect("Failed to parse test component")
}

/// A VEVENT with DTSTAMP and SEQUENCE plus the given extra lines.
pub fn event(uid: &str, extra: &[&str]) -> Component {
    let uid_line = format!("UID:{uid}");
    let mut lines = vec![
        "BEGIN:VEVENT",
        uid_line.as_str(),
        "DTSTAMP:20240101T000000Z",
        "SEQUENCE:0",
    ];
    lines.extend_from_slice(extra);
    lines.push("END:VEVENT");
    component(&lines)
}

/// A calendar document wrapping the given component blocks.
pub fn calendar(blocks: &[&str]) -> String {
    let mut text = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//calcache//tests//EN\r\n");
    for block in blocks {
        text.push_str(block);
    }
    text.push_str("END:VCALENDAR\r\n");
    text
}

/// A fixed UTC+02:00 zone with a made-up TZID.
pub const CUSTOM_ZONE: &str = "BEGIN:VTIMEZONE\r\n\
TZID:Custom/Plus Two\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19700101T000000\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0200\r\n\
TZNAME:CPT\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n";
