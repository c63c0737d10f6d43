#![allow(clippy::expect_used)]
//! Search expressions and the row visitor.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use calcache_db::{
    CalCache, Cancellable, CacheError, ComponentId, DeletedFlag, MatchType, SearchExpr, TextField,
};

use super::helpers::*;

fn text(field: TextField, match_type: MatchType, value: &str) -> SearchExpr {
    SearchExpr::Text {
        field,
        match_type,
        value: value.to_string(),
    }
}

fn matching(cache: &CalCache, expr: &SearchExpr) -> Vec<String> {
    cache
        .search_ids(Some(expr), None)
        .expect("search")
        .into_iter()
        .map(|id| id.uid)
        .collect()
}

fn meeting() -> TestCache {
    let test = TestCache::new();
    test.put(&event(
        "meeting",
        &[
            "DTSTART:20240109T090000Z",
            "SUMMARY:Café review",
            "LOCATION:Room 5",
            "ORGANIZER;CN=Zoe:mailto:zoe@x.com",
            "ATTENDEE;CN=Alice:mailto:alice@x.com",
            "ATTENDEE;CN=Bob:mailto:bob@x.com",
            "CATEGORIES:Work,Review",
            "CLASS:PRIVATE",
            "PRIORITY:2",
            "BEGIN:VALARM",
            "ACTION:DISPLAY",
            "TRIGGER:-PT15M",
            "END:VALARM",
        ],
    ));
    test.put(&event("lunch", &["SUMMARY:Lunch", "PRIORITY:7"]));
    test
}

#[test_log::test]
fn attendee_list_matches_whole_entries() {
    let test = meeting();
    let whole = text(TextField::Attendees, MatchType::Contains, "\nBob\tbob@x.com\n");
    let partial = text(TextField::Attendees, MatchType::Contains, "\nBo\t");

    assert_eq!(matching(&test.cache, &whole), ["meeting"]);
    assert!(matching(&test.cache, &partial).is_empty());

    assert_eq!(
        matching(&test.cache, &SearchExpr::Attendee("MAILTO:Alice@X.com".into())),
        ["meeting"]
    );
    assert!(matching(&test.cache, &SearchExpr::Attendee("lice@x.com".into())).is_empty());
    assert_eq!(
        matching(&test.cache, &SearchExpr::Organizer("zoe@x.com".into())),
        ["meeting"]
    );
}

#[test_log::test]
fn text_search_ignores_case_and_accents() {
    let test = meeting();
    assert_eq!(
        matching(&test.cache, &text(TextField::Summary, MatchType::Contains, "CAFE")),
        ["meeting"]
    );
    assert_eq!(
        matching(&test.cache, &text(TextField::Summary, MatchType::StartsWith, "lun")),
        ["lunch"]
    );
    assert!(matching(&test.cache, &text(TextField::Summary, MatchType::Equals, "lun")).is_empty());
    assert!(matching(&test.cache, &text(TextField::Location, MatchType::Contains, "5%")).is_empty());
    assert_eq!(
        matching(&test.cache, &text(TextField::Any, MatchType::Contains, "room 5")),
        ["meeting"]
    );
}

#[test_log::test]
fn any_text_matches_unfolded_unescaped_values() {
    let test = TestCache::new();
    let long = format!(
        "DESCRIPTION:{}wxy a needle haystack\\, with a comma",
        "filler ".repeat(8)
    );
    test.put(&event("long", &["SUMMARY:Plain", long.as_str()]));
    test.put(&event("other", &["SUMMARY:Unrelated"]));

    let stored = test
        .cache
        .get_component_as_string("long", None, None)
        .expect("stored text");
    assert!(!stored.contains("needle haystack"), "payload should fold inside the phrase");

    assert_eq!(
        matching(&test.cache, &text(TextField::Any, MatchType::Contains, "needle haystack")),
        ["long"]
    );
    assert_eq!(
        matching(&test.cache, &text(TextField::Any, MatchType::Contains, "haystack, with")),
        ["long"]
    );
    assert_eq!(
        matching(&test.cache, &text(TextField::Any, MatchType::Contains, "")),
        ["long", "other"]
    );
}

#[test_log::test]
fn structured_fields() {
    let test = meeting();
    assert_eq!(matching(&test.cache, &SearchExpr::Category("Review".into())), ["meeting"]);
    assert!(matching(&test.cache, &SearchExpr::Category("Rev".into())).is_empty());
    assert_eq!(
        matching(&test.cache, &SearchExpr::Classification("private".into())),
        ["meeting"]
    );
    assert_eq!(
        matching(&test.cache, &SearchExpr::Status("not started".into())),
        ["lunch", "meeting"]
    );
    assert_eq!(
        matching(&test.cache, &SearchExpr::Priority(Ordering::Less, 5)),
        ["meeting"]
    );
    assert_eq!(
        matching(&test.cache, &SearchExpr::Priority(Ordering::Greater, 5)),
        ["lunch"]
    );
    assert_eq!(matching(&test.cache, &SearchExpr::HasAlarm), ["meeting"]);
    assert_eq!(matching(&test.cache, &SearchExpr::HasStart), ["meeting"]);
    assert!(matching(&test.cache, &SearchExpr::HasRecurrences).is_empty());
}

#[test_log::test]
fn boolean_combinators() {
    let test = meeting();
    let all = matching(&test.cache, &SearchExpr::All);
    assert_eq!(all, ["lunch", "meeting"]);
    assert_eq!(
        test.cache.search(None, None).expect("search").len(),
        all.len()
    );

    assert_eq!(
        matching(&test.cache, &SearchExpr::Not(Box::new(SearchExpr::HasAlarm))),
        ["lunch"]
    );
    assert_eq!(
        matching(
            &test.cache,
            &SearchExpr::And(vec![SearchExpr::HasAlarm, SearchExpr::Uid("lunch".into())])
        ),
        Vec::<String>::new()
    );
    assert_eq!(
        matching(
            &test.cache,
            &SearchExpr::Or(vec![SearchExpr::HasAlarm, SearchExpr::Uid("lunch".into())])
        ),
        ["lunch", "meeting"]
    );
    assert!(matching(&test.cache, &SearchExpr::Or(Vec::new())).is_empty());
    assert_eq!(matching(&test.cache, &SearchExpr::And(Vec::new())).len(), 2);
}

#[test_log::test]
fn uid_matches_master_and_instances() {
    let test = TestCache::new();
    test.put(&event("U1", &[]));
    test.put(&event("U1", &["RECURRENCE-ID:20240102T000000Z"]));
    test.put(&event("U10", &[]));

    let ids = test
        .cache
        .search_ids(Some(&SearchExpr::Uid("U1".into())), None)
        .expect("search");
    assert_eq!(
        ids,
        vec![
            ComponentId::new("U1", None),
            ComponentId::new("U1", Some("20240102T000000Z")),
        ]
    );
}

#[test_log::test]
fn uid_search_ignores_other_case() {
    let test = TestCache::new();
    test.put(&event("abc", &[]));
    test.put(&event("ABC", &["RECURRENCE-ID:20240110T090000Z"]));

    let ids = test
        .cache
        .search_ids(Some(&SearchExpr::Uid("abc".into())), None)
        .expect("search");
    assert_eq!(ids, vec![ComponentId::new("abc", None)]);
}

#[test_log::test]
fn visitor_can_stop_early() {
    let test = TestCache::new();
    for uid in ["a", "b", "c", "d"] {
        test.put(&event(uid, &[]));
    }

    let mut seen = Vec::new();
    test.cache
        .search_with_callback(None, DeletedFlag::Exclude, None, |row| {
            seen.push(row.id.uid);
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .expect("search");
    assert_eq!(seen, ["a", "b"]);
}

#[test_log::test]
fn cancelled_search_never_visits() {
    let test = meeting();
    let token = Cancellable::new();
    token.cancel();

    let mut visited = 0;
    let result = test
        .cache
        .search_with_callback(None, DeletedFlag::Exclude, Some(&token), |_| {
            visited += 1;
            ControlFlow::Continue(())
        });
    assert!(matches!(result, Err(CacheError::Cancelled)));
    assert_eq!(visited, 0);
}

#[test_log::test]
fn due_and_completed_ranges() {
    let test = TestCache::new();
    test.cache
        .put_component_from_str(
            "BEGIN:VTODO\r\nUID:t1\r\nDUE:20240601T120000Z\r\nCOMPLETED:20240530T080000Z\r\nEND:VTODO\r\n",
            None,
            calcache_db::OfflineFlag::Online,
            None,
        )
        .expect("task");

    let due = SearchExpr::DueIn {
        start: utc(2024, 6, 1, 0, 0),
        end: utc(2024, 6, 2, 0, 0),
    };
    let completed = SearchExpr::CompletedIn {
        start: utc(2024, 5, 30, 0, 0),
        end: utc(2024, 5, 31, 0, 0),
    };
    let too_late = SearchExpr::DueIn {
        start: utc(2024, 6, 2, 0, 0),
        end: utc(2024, 6, 3, 0, 0),
    };
    assert_eq!(matching(&test.cache, &due), ["t1"]);
    assert_eq!(matching(&test.cache, &completed), ["t1"]);
    assert!(matching(&test.cache, &too_late).is_empty());
}
