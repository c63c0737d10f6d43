#![allow(clippy::expect_used)]
//! Time-range queries over the derived occurrence bounds.

use calcache_db::CalCache;
use chrono::{DateTime, Utc};

use super::helpers::*;

fn uids_in(cache: &CalCache, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
    cache
        .get_components_in_range(start, end, None)
        .expect("range query")
        .iter()
        .filter_map(|c| c.uid().map(str::to_string))
        .collect()
}

#[test_log::test]
fn single_event_overlap() {
    let test = TestCache::new();
    test.put(&event(
        "A",
        &["DTSTART:20240109T090000Z", "DTEND:20240109T103000Z"],
    ));

    assert_eq!(uids_in(&test.cache, utc(2024, 1, 9, 0, 0), utc(2024, 1, 10, 0, 0)), ["A"]);
    assert!(uids_in(&test.cache, utc(2024, 1, 10, 0, 0), utc(2024, 1, 11, 0, 0)).is_empty());
}

#[test_log::test]
fn range_edges_are_half_open() {
    let test = TestCache::new();
    test.put(&event(
        "edge",
        &["DTSTART:20240109T090000Z", "DTEND:20240109T100000Z"],
    ));

    // Ends exactly where the query starts.
    assert!(uids_in(&test.cache, utc(2024, 1, 9, 10, 0), utc(2024, 1, 9, 11, 0)).is_empty());
    // Starts exactly where the query ends.
    assert!(uids_in(&test.cache, utc(2024, 1, 9, 8, 0), utc(2024, 1, 9, 9, 0)).is_empty());
    assert_eq!(
        uids_in(&test.cache, utc(2024, 1, 9, 9, 59), utc(2024, 1, 9, 11, 0)),
        ["edge"]
    );
}

#[test_log::test]
fn task_without_start_matches_every_range() {
    let test = TestCache::new();
    test.cache
        .put_component_from_str(
            "BEGIN:VTODO\r\nUID:D\r\nDUE:20240601T000000Z\r\nEND:VTODO\r\n",
            None,
            calcache_db::OfflineFlag::Online,
            None,
        )
        .expect("task");

    let columns = test.cache.store().get_columns("D").expect("columns");
    assert_eq!(columns.occur_start, None);
    assert_eq!(columns.occur_end, None);
    assert_eq!(columns.due.as_deref(), Some("20240601000000"));

    assert_eq!(uids_in(&test.cache, utc(1999, 1, 1, 0, 0), utc(1999, 1, 2, 0, 0)), ["D"]);
    assert_eq!(uids_in(&test.cache, utc(2030, 5, 1, 0, 0), utc(2030, 5, 2, 0, 0)), ["D"]);
}

#[test_log::test]
fn bounded_recurrence_covers_all_occurrences() {
    let test = TestCache::new();
    test.put(&event(
        "daily",
        &[
            "DTSTART:20240101T090000Z",
            "DTEND:20240101T100000Z",
            "RRULE:FREQ=DAILY;COUNT=5",
        ],
    ));

    assert_eq!(
        uids_in(&test.cache, utc(2024, 1, 5, 9, 30), utc(2024, 1, 5, 9, 45)),
        ["daily"]
    );
    assert!(uids_in(&test.cache, utc(2024, 1, 5, 10, 0), utc(2024, 1, 6, 0, 0)).is_empty());
}

#[test_log::test]
fn utc_until_bounds_recurrence_in_stored_zone() {
    let test = TestCache::new();
    let zone = calcache_rfc::rfc::ical::parse_component(CUSTOM_ZONE).expect("zone parses");
    test.cache.put_timezone(&zone, None).expect("put timezone");

    // 09:00 at +02:00 is 07:00Z, so UNTIL lands exactly on the third occurrence.
    test.put(&event(
        "vtz",
        &[
            "DTSTART;TZID=Custom/Plus Two:20240101T090000",
            "DTEND;TZID=Custom/Plus Two:20240101T100000",
            "RRULE:FREQ=DAILY;UNTIL=20240103T070000Z",
        ],
    ));

    let columns = test.cache.store().get_columns("vtz").expect("columns");
    assert_eq!(columns.occur_start.as_deref(), Some("20240101070000"));
    assert_eq!(columns.occur_end.as_deref(), Some("20240103080000"));
    assert_eq!(
        uids_in(&test.cache, utc(2024, 1, 3, 7, 0), utc(2024, 1, 3, 8, 0)),
        ["vtz"]
    );
    assert!(uids_in(&test.cache, utc(2024, 1, 4, 7, 0), utc(2024, 1, 4, 8, 0)).is_empty());
}

#[test_log::test]
fn endless_recurrence_has_no_end() {
    let test = TestCache::new();
    test.put(&event(
        "weekly",
        &["DTSTART:20240101T090000Z", "RRULE:FREQ=WEEKLY"],
    ));

    assert_eq!(test.cache.store().get_columns("weekly").expect("columns").occur_end, None);
    assert_eq!(
        uids_in(&test.cache, utc(2090, 1, 1, 0, 0), utc(2090, 1, 2, 0, 0)),
        ["weekly"]
    );
    assert!(uids_in(&test.cache, utc(2023, 1, 1, 0, 0), utc(2023, 12, 31, 0, 0)).is_empty());
}

#[test_log::test]
fn all_day_event_lasts_one_day() {
    let test = TestCache::new();
    test.put(&event("holiday", &["DTSTART;VALUE=DATE:20240704"]));

    assert_eq!(
        uids_in(&test.cache, utc(2024, 7, 4, 23, 0), utc(2024, 7, 5, 1, 0)),
        ["holiday"]
    );
    assert!(uids_in(&test.cache, utc(2024, 7, 5, 0, 0), utc(2024, 7, 6, 0, 0)).is_empty());
}

#[test_log::test]
fn results_are_ordered_by_key() {
    let test = TestCache::new();
    for uid in ["c", "a", "b"] {
        test.put(&event(uid, &["DTSTART:20240109T090000Z"]));
    }
    test.put(&event("a", &["RECURRENCE-ID:20240110T090000Z", "DTSTART:20240110T090000Z"]));

    let found = test
        .cache
        .get_components_in_range_as_strings(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0), None)
        .expect("range query");
    assert_eq!(found.len(), 4);
    assert_eq!(
        uids_in(&test.cache, utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0)),
        ["a", "a", "b", "c"]
    );
}
