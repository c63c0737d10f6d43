#![allow(clippy::expect_used)]
//! Opening, reopening, revisions and cancellation.

use calcache_core::config::CacheConfig;
use calcache_db::db::migrate::CACHE_VERSION;
use calcache_db::{CacheError, CalCache, Cancellable, ComponentInput, DeletedFlag, OfflineFlag};

use super::helpers::*;

#[test_log::test]
fn data_survives_reopen() {
    let test = TestCache::new();
    test.put(&event("persist", &["DTSTART:20240109T090000Z", "SUMMARY:Kept"]));
    let revision = test.cache.get_revision().expect("revision");
    assert!(revision.is_some());

    let test = test.reopen();
    assert_eq!(test.cache.store().get_version().expect("version"), CACHE_VERSION);
    assert_eq!(test.cache.get_revision().expect("revision"), revision);
    let stored = test.cache.get_component("persist", None, None).expect("component");
    assert_eq!(stored.summary(), Some("Kept"));
}

#[test_log::test]
fn every_write_changes_revision() {
    let test = TestCache::new();
    test.put(&event("r", &[]));
    let first = test.cache.get_revision().expect("revision").expect("set after put");
    assert!(first.ends_with(')'), "unexpected revision {first}");

    test.cache
        .set_component_extra("r", None, Some("x"), None)
        .expect("extra");
    let second = test.cache.get_revision().expect("revision").expect("set");
    assert_ne!(first, second);

    test.cache
        .remove_component("r", None, OfflineFlag::Online, None)
        .expect("remove");
    let third = test.cache.get_revision().expect("revision").expect("set");
    assert_ne!(second, third);
}

#[test_log::test]
fn reopened_cache_never_repeats_revision() {
    let mut test = TestCache::new();
    let mut seen = Vec::new();
    for round in 0..3 {
        let summary = format!("SUMMARY:Round {round}");
        test.put(&event("again", &[summary.as_str()]));
        let revision = test.cache.get_revision().expect("revision").expect("set");
        assert!(!seen.contains(&revision), "revision {revision} repeated");
        seen.push(revision);
        test = test.reopen();
    }
}

#[test_log::test]
fn newer_schema_is_refused() {
    let test = TestCache::new();
    test.cache
        .store()
        .set_version(CACHE_VERSION + 1)
        .expect("version");
    let path = test.path();

    let reopened = CalCache::open(&path, chrono_tz::UTC);
    assert!(matches!(reopened, Err(CacheError::SchemaError(_))));
}

#[test_log::test]
fn cancelled_operations_write_nothing() {
    let test = TestCache::new();
    let token = Cancellable::new();
    token.cancel();

    let item = event("c", &[]);
    assert!(matches!(
        test.cache
            .put_component(&item, None, OfflineFlag::Online, Some(&token)),
        Err(CacheError::Cancelled)
    ));
    assert!(matches!(
        test.cache.put_components(
            &[ComponentInput::from(&item)],
            OfflineFlag::Online,
            Some(&token)
        ),
        Err(CacheError::Cancelled)
    ));
    assert!(matches!(
        test.cache.remove_all(Some(&token)),
        Err(CacheError::Cancelled)
    ));
    assert_eq!(test.cache.get_count(DeletedFlag::Include, None).expect("count"), 0);
    assert_eq!(test.cache.get_revision().expect("revision"), None);
}

#[test_log::test]
fn opens_from_config() {
    let test = TestCache::new();
    let config = CacheConfig {
        path: test.path(),
        default_timezone: "Europe/Berlin".to_string(),
    };

    let cache = CalCache::open_with_config(&config).expect("open from config");
    assert_eq!(cache.default_timezone(), chrono_tz::Europe::Berlin);

    let floating = event("floating", &["DTSTART:20240109T100000"]);
    cache
        .put_component(&floating, None, OfflineFlag::Online, None)
        .expect("put");
    assert_eq!(
        cache.store().get_columns("floating").expect("columns").occur_start.as_deref(),
        Some("20240109090000")
    );

    let bad = CacheConfig {
        path: test.path(),
        default_timezone: "Mars/Olympus".to_string(),
    };
    assert!(matches!(
        CalCache::open_with_config(&bad),
        Err(CacheError::CoreError(_))
    ));
}
