#![allow(clippy::expect_used)]
//! The timezone table and its in-memory map.

use calcache_db::{CacheError, DeletedFlag};
use calcache_rfc::rfc::ical::{parse_component, serialize_component};

use super::helpers::*;

#[test_log::test]
fn stored_timezone_reads_back() {
    let test = TestCache::new();
    let zone = parse_component(CUSTOM_ZONE).expect("zone parses");
    test.cache.put_timezone(&zone, None).expect("put timezone");

    let loaded = test.cache.get_timezone("Custom/Plus Two", None).expect("timezone");
    assert_eq!(loaded.tzid, "Custom/Plus Two");
    assert_eq!(
        test.cache
            .dup_timezone_as_string("Custom/Plus Two", None)
            .expect("timezone"),
        serialize_component(&zone)
    );
    assert!(matches!(
        test.cache.get_timezone("Nowhere/Else", None),
        Err(CacheError::NotFound(_))
    ));
}

#[test_log::test]
fn rejects_unusable_timezones() {
    let test = TestCache::new();
    let no_tzid = parse_component(
        "BEGIN:VTIMEZONE\r\nBEGIN:STANDARD\r\nDTSTART:19700101T000000\r\n\
         TZOFFSETFROM:+0100\r\nTZOFFSETTO:+0100\r\nEND:STANDARD\r\nEND:VTIMEZONE\r\n",
    )
    .expect("zone parses");
    assert!(matches!(
        test.cache.put_timezone(&no_tzid, None),
        Err(CacheError::MissingIdentifier)
    ));

    let no_rules = parse_component("BEGIN:VTIMEZONE\r\nTZID:Empty/Zone\r\nEND:VTIMEZONE\r\n")
        .expect("zone parses");
    assert!(matches!(
        test.cache.put_timezone(&no_rules, None),
        Err(CacheError::MissingDefinition(_))
    ));
}

#[test_log::test]
fn components_resolve_through_stored_zone() {
    let test = TestCache::new();
    let zone = parse_component(CUSTOM_ZONE).expect("zone parses");
    test.cache.put_timezone(&zone, None).expect("put timezone");

    test.put(&event(
        "zoned",
        &[
            "DTSTART;TZID=Custom/Plus Two:20240109T100000",
            "DTEND;TZID=Custom/Plus Two:20240109T110000",
        ],
    ));
    let columns = test.cache.store().get_columns("zoned").expect("columns");
    assert_eq!(columns.occur_start.as_deref(), Some("20240109080000"));
    assert_eq!(columns.occur_end.as_deref(), Some("20240109090000"));

    // IANA names resolve without a stored definition.
    test.put(&event("iana", &["DTSTART;TZID=America/New_York:20240109T090000"]));
    let columns = test.cache.store().get_columns("iana").expect("columns");
    assert_eq!(columns.occur_start.as_deref(), Some("20240109140000"));
}

#[test_log::test]
fn parsed_zone_outlives_table_changes() {
    let test = TestCache::new();
    let zone = parse_component(CUSTOM_ZONE).expect("zone parses");
    test.cache.put_timezone(&zone, None).expect("put timezone");
    let first = test.cache.get_timezone("Custom/Plus Two", None).expect("timezone");

    let replaced = parse_component(&CUSTOM_ZONE.replace("+0200", "+0300")).expect("zone parses");
    test.cache.put_timezone(&replaced, None).expect("put timezone");
    let second = test.cache.get_timezone("Custom/Plus Two", None).expect("timezone");
    assert_eq!(first.to_ical_string(), second.to_ical_string());

    test.cache.remove_all(None).expect("remove all");
    assert_eq!(test.cache.get_count(DeletedFlag::Include, None).expect("count"), 0);
    assert!(test.cache.get_timezone("Custom/Plus Two", None).is_ok());
}

#[test_log::test]
fn list_timezones_loads_stored_rows() {
    let test = TestCache::new();
    for name in ["Custom/B", "Custom/A"] {
        let zone = parse_component(&CUSTOM_ZONE.replace("Custom/Plus Two", name))
            .expect("zone parses");
        test.cache.put_timezone(&zone, None).expect("put timezone");
    }

    // A fresh cache has nothing parsed yet.
    let test = test.reopen();
    let listed: Vec<String> = test
        .cache
        .list_timezones(None)
        .expect("list")
        .iter()
        .map(|tz| tz.tzid.clone())
        .collect();
    assert_eq!(listed, ["Custom/A", "Custom/B"]);
}
