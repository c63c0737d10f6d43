#![allow(clippy::expect_used)]
//! Component CRUD, UID grouping and batch behaviour.

use calcache_db::{CacheError, ComponentId, ComponentInput, DeletedFlag, OfflineFlag};
use calcache_rfc::rfc::ical::serialize_component;

use super::helpers::*;

#[test_log::test]
fn put_then_get_round_trips() {
    let test = TestCache::new();
    let original = event(
        "round-trip",
        &[
            "DTSTART:20240109T090000Z",
            "DTEND:20240109T103000Z",
            "SUMMARY:Planning",
            "ATTENDEE;CN=Alice:mailto:alice@x.com",
        ],
    );
    test.put(&original);

    let stored = test
        .cache
        .get_component("round-trip", None, None)
        .expect("component should be stored");
    assert_eq!(stored.uid(), Some("round-trip"));
    assert_eq!(stored.summary(), Some("Planning"));
    assert_eq!(
        stored.get_property("DTSTART").map(|p| p.raw_value.as_str()),
        Some("20240109T090000Z")
    );
    assert_eq!(serialize_component(&stored), serialize_component(&original));

    let text = test
        .cache
        .get_component_as_string("round-trip", None, None)
        .expect("component should be stored");
    assert_eq!(text, serialize_component(&original));
}

#[test_log::test]
fn revision_follows_sequence_only() {
    let test = TestCache::new();
    test.put(&event("rev", &["SUMMARY:First"]));
    let first = test.cache.get_component_revision("rev", None, None).expect("revision");

    test.put(&event("rev", &["SUMMARY:Renamed"]));
    let renamed = test.cache.get_component_revision("rev", None, None).expect("revision");
    assert_eq!(first, renamed);

    let bumped = component(&[
        "BEGIN:VEVENT",
        "UID:rev",
        "DTSTAMP:20240101T000000Z",
        "SEQUENCE:1",
        "END:VEVENT",
    ]);
    test.put(&bumped);
    let after = test.cache.get_component_revision("rev", None, None).expect("revision");
    assert_ne!(first, after);
}

#[test_log::test]
fn master_sorts_before_instances() {
    let test = TestCache::new();
    test.put(&event("U1", &["RECURRENCE-ID:R1", "SUMMARY:Instance"]));
    test.put(&event("U1", &["SUMMARY:Master", "RRULE:FREQ=DAILY;COUNT=3"]));
    test.put(&event("U10", &["SUMMARY:Neighbour"]));

    let group = test
        .cache
        .get_components_by_uid("U1", None)
        .expect("group should exist");
    assert_eq!(group.len(), 2);
    assert_eq!(group[0].recurrence_id(), None);
    assert_eq!(group[0].summary(), Some("Master"));
    assert_eq!(group[1].recurrence_id(), Some("R1"));

    let strings = test
        .cache
        .get_components_by_uid_as_strings("U1", None)
        .expect("group should exist");
    assert_eq!(strings.len(), 2);
}

#[test_log::test]
fn uid_grouping_is_case_sensitive() {
    let test = TestCache::new();
    test.put(&event("abc", &["SUMMARY:Lower"]));
    test.put(&event("ABC", &["RECURRENCE-ID:20240110T090000Z", "SUMMARY:Upper"]));

    let strings = test
        .cache
        .get_components_by_uid_as_strings("abc", None)
        .expect("group should exist");
    assert_eq!(strings.len(), 1);
    assert!(strings[0].contains("UID:abc"));

    let group = test.cache.get_components_by_uid("ABC", None).expect("group should exist");
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].summary(), Some("Upper"));
}

#[test_log::test]
fn removing_master_keeps_instances() {
    let test = TestCache::new();
    test.put(&event("U1", &["SUMMARY:Master"]));
    test.put(&event("U1", &["RECURRENCE-ID:R1"]));

    test.cache
        .remove_component("U1", Some(""), OfflineFlag::Online, None)
        .expect("master should be removed");

    let group = test.cache.get_components_by_uid("U1", None).expect("instance remains");
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].recurrence_id(), Some("R1"));

    test.cache
        .remove_component("U1", Some("R1"), OfflineFlag::Online, None)
        .expect("instance should be removed");
    assert!(matches!(
        test.cache.get_components_by_uid("U1", None),
        Err(CacheError::NotFound(_))
    ));
}

#[test_log::test]
fn put_twice_is_idempotent() {
    let test = TestCache::new();
    let item = event("same", &["DTSTART:20240109T090000Z", "SUMMARY:Twice"]);
    test.put(&item);
    let columns = test.cache.store().get_columns("same").expect("columns");
    let revision = test.cache.get_component_revision("same", None, None).expect("revision");

    test.put(&item);
    assert_eq!(test.cache.get_count(DeletedFlag::Exclude, None).expect("count"), 1);
    assert_eq!(test.cache.store().get_columns("same").expect("columns"), columns);
    assert_eq!(
        test.cache.get_component_revision("same", None, None).expect("revision"),
        revision
    );
}

#[test_log::test]
fn failed_batch_stores_nothing() {
    let test = TestCache::new();
    let first = event("b1", &["SUMMARY:One"]);
    let second = event("b2", &["SUMMARY:Two"]);
    let invalid = component(&["BEGIN:VEVENT", "SUMMARY:No UID", "END:VEVENT"]);
    let fourth = event("b4", &["SUMMARY:Four"]);

    let batch = [
        ComponentInput::from(&first),
        ComponentInput::from(&second),
        ComponentInput::from(&invalid),
        ComponentInput::from(&fourth),
    ];
    let result = test.cache.put_components(&batch, OfflineFlag::Online, None);
    assert!(matches!(result, Err(CacheError::InvalidComponent(_))));
    assert_eq!(test.cache.get_count(DeletedFlag::Include, None).expect("count"), 0);
    assert_eq!(test.cache.get_revision().expect("revision"), None);

    let valid = [ComponentInput::from(&first), ComponentInput::from(&second)];
    test.cache
        .put_components(&valid, OfflineFlag::Online, None)
        .expect("valid batch");
    assert_eq!(test.cache.get_count(DeletedFlag::Exclude, None).expect("count"), 2);
}

#[test_log::test]
fn rejects_non_schedulable_components() {
    let test = TestCache::new();
    let alarm = component(&["BEGIN:VALARM", "UID:a", "ACTION:DISPLAY", "END:VALARM"]);
    assert!(matches!(
        test.cache.put_component(&alarm, None, OfflineFlag::Online, None),
        Err(CacheError::InvalidComponent(_))
    ));
    assert!(matches!(
        test.cache
            .put_component_from_str("not a component", None, OfflineFlag::Online, None),
        Err(CacheError::InvalidComponent(_))
    ));
}

#[test_log::test]
fn extra_is_kept_apart_from_payload() {
    let test = TestCache::new();
    test.cache
        .put_component_from_str(
            "BEGIN:VTODO\r\nUID:task\r\nSUMMARY:Chore\r\nEND:VTODO\r\n",
            Some("etag-1"),
            OfflineFlag::Online,
            None,
        )
        .expect("task should be stored");
    assert_eq!(
        test.cache.get_component_extra("task", None, None).expect("extra"),
        Some("etag-1".to_string())
    );

    let before = test.cache.get_component_as_string("task", None, None).expect("payload");
    test.cache
        .set_component_extra("task", None, Some("etag-2"), None)
        .expect("extra should update");
    assert_eq!(
        test.cache.get_component_extra("task", None, None).expect("extra"),
        Some("etag-2".to_string())
    );
    assert_eq!(
        test.cache.get_component_as_string("task", None, None).expect("payload"),
        before
    );

    assert!(matches!(
        test.cache.set_component_extra("missing", None, Some("x"), None),
        Err(CacheError::NotFound(_))
    ));
}

#[test_log::test]
fn lists_and_removes_by_id() {
    let test = TestCache::new();
    test.put(&event("a", &[]));
    test.put(&event("a", &["RECURRENCE-ID:20240102T000000Z"]));
    test.put(&event("b", &[]));

    let ids = test.cache.get_uids(DeletedFlag::Exclude, None).expect("ids");
    assert_eq!(
        ids,
        vec![
            ComponentId::new("a", None),
            ComponentId::new("a", Some("20240102T000000Z")),
            ComponentId::new("b", None),
        ]
    );
    assert!(test
        .cache
        .contains_component("a", Some("20240102T000000Z"), DeletedFlag::Exclude, None)
        .expect("contains"));

    let missing = [ComponentId::new("a", None), ComponentId::new("zzz", None)];
    assert!(matches!(
        test.cache.remove_components(&missing, OfflineFlag::Online, None),
        Err(CacheError::NotFound(_))
    ));
    assert_eq!(test.cache.get_count(DeletedFlag::Exclude, None).expect("count"), 3);

    test.cache
        .remove_components(&ids[..2], OfflineFlag::Online, None)
        .expect("removal");
    assert_eq!(
        test.cache.get_uids(DeletedFlag::Exclude, None).expect("ids"),
        vec![ComponentId::new("b", None)]
    );
}

#[test_log::test]
fn import_stores_timezones_and_components() {
    let test = TestCache::new();
    let text = calendar(&[
        CUSTOM_ZONE,
        "BEGIN:VEVENT\r\nUID:imp-1\r\nDTSTART;TZID=Custom/Plus Two:20240109T100000\r\nEND:VEVENT\r\n",
        "BEGIN:VTODO\r\nUID:imp-2\r\nEND:VTODO\r\n",
    ]);

    let stored = test
        .cache
        .import_calendar(&text, OfflineFlag::Online, None)
        .expect("import");
    assert_eq!(stored, 2);
    assert!(test.cache.get_timezone("Custom/Plus Two", None).is_ok());
    assert_eq!(
        test.cache.store().get_columns("imp-1").expect("columns").occur_start.as_deref(),
        Some("20240109080000")
    );
}

#[test_log::test]
fn failed_import_keeps_no_timezones() {
    let test = TestCache::new();
    let text = calendar(&[
        CUSTOM_ZONE,
        "BEGIN:VEVENT\r\nUID:ok\r\nDTSTART;TZID=Custom/Plus Two:20240109T100000\r\nEND:VEVENT\r\n",
        "BEGIN:VEVENT\r\nSUMMARY:No UID\r\nEND:VEVENT\r\n",
    ]);

    assert!(test.cache.import_calendar(&text, OfflineFlag::Online, None).is_err());
    assert!(test.cache.list_timezones(None).expect("list").is_empty());
    assert!(matches!(
        test.cache.get_timezone("Custom/Plus Two", None),
        Err(CacheError::NotFound(_))
    ));
    assert_eq!(test.cache.get_count(DeletedFlag::Exclude, None).expect("count"), 0);
}
