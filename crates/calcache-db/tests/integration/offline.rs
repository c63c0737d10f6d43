#![allow(clippy::expect_used)]
//! Offline change tracking through the cache surface.

use std::ops::ControlFlow;

use calcache_db::{CacheError, DeletedFlag, OfflineFlag, OfflineState};

use super::helpers::*;

#[test_log::test]
fn offline_lifecycle() {
    let test = TestCache::new();
    let synced = event("synced", &["SUMMARY:Server copy"]);
    let local = event("local", &["SUMMARY:Made offline"]);

    test.put(&synced);
    test.cache
        .put_component(&local, None, OfflineFlag::Offline, None)
        .expect("offline put");
    test.cache
        .put_component(&synced, None, OfflineFlag::Offline, None)
        .expect("offline edit");

    assert_eq!(
        test.cache.get_offline_state("local", None, None).expect("state"),
        OfflineState::LocallyCreated
    );
    assert_eq!(
        test.cache.get_offline_state("synced", None, None).expect("state"),
        OfflineState::LocallyModified
    );

    // A locally created row disappears; a synced one is only marked.
    test.cache
        .remove_component("local", None, OfflineFlag::Offline, None)
        .expect("offline remove");
    test.cache
        .remove_component("synced", None, OfflineFlag::Offline, None)
        .expect("offline remove");

    assert!(!test
        .cache
        .contains_component("local", None, DeletedFlag::Include, None)
        .expect("contains"));
    assert!(!test
        .cache
        .contains_component("synced", None, DeletedFlag::Exclude, None)
        .expect("contains"));
    assert!(test
        .cache
        .contains_component("synced", None, DeletedFlag::Include, None)
        .expect("contains"));
    assert!(matches!(
        test.cache.get_component("synced", None, None),
        Err(CacheError::NotFound(_))
    ));
    assert_eq!(test.cache.get_count(DeletedFlag::Exclude, None).expect("count"), 0);
    assert_eq!(test.cache.get_count(DeletedFlag::Include, None).expect("count"), 1);

    let changes = test.cache.get_offline_changes(None).expect("changes");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].uid, "synced");
    assert_eq!(changes[0].state, OfflineState::LocallyDeleted);

    test.cache.clear_offline_changes(None).expect("clear");
    assert!(test.cache.get_offline_changes(None).expect("changes").is_empty());
    assert_eq!(test.cache.get_count(DeletedFlag::Include, None).expect("count"), 0);
}

#[test_log::test]
fn deleted_rows_are_hidden_from_search() {
    let test = TestCache::new();
    test.put(&event("kept", &["DTSTART:20240109T090000Z"]));
    test.put(&event("gone", &["DTSTART:20240109T090000Z"]));
    test.cache
        .remove_component("gone", None, OfflineFlag::Offline, None)
        .expect("offline remove");

    let in_range = test
        .cache
        .get_components_in_range(utc(2024, 1, 9, 0, 0), utc(2024, 1, 10, 0, 0), None)
        .expect("range");
    assert_eq!(in_range.len(), 1);
    assert_eq!(in_range[0].uid(), Some("kept"));

    let mut states = Vec::new();
    test.cache
        .search_with_callback(None, DeletedFlag::Include, None, |row| {
            states.push((row.id.uid, row.state));
            ControlFlow::Continue(())
        })
        .expect("search");
    assert_eq!(
        states,
        vec![
            ("gone".to_string(), OfflineState::LocallyDeleted),
            ("kept".to_string(), OfflineState::Synced),
        ]
    );
}

#[test_log::test]
fn state_can_be_set_explicitly() {
    let test = TestCache::new();
    test.put(&event("e", &[]));
    test.cache
        .set_offline_state("e", None, OfflineState::LocallyModified, None)
        .expect("set state");
    assert_eq!(
        test.cache.get_offline_state("e", None, None).expect("state"),
        OfflineState::LocallyModified
    );
    assert!(matches!(
        test.cache.get_offline_state("missing", None, None),
        Err(CacheError::NotFound(_))
    ));
}
