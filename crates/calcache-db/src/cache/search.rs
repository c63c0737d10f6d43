//! Search expressions over the derived columns.
//!
//! A [`SearchExpr`] is translated into one boxed `WHERE` condition and run as
//! a single streaming query; every read that filters rows goes through
//! [`CalCache::search_with_callback`].

use std::cmp::Ordering;
use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use diesel::dsl::not;
use diesel::prelude::*;

use calcache_rfc::rfc::ical::core::Component;

use super::cancel::check;
use super::extract::{encode_utc, strip_mailto};
use super::{CalCache, Cancellable, ComponentId, parse_stored};
use crate::db::enums::{DeletedFlag, OfflineState};
use crate::db::query::object::{self, ObjectPredicate};
use crate::db::query::text_match::{
    MatchType, build_like_pattern, decompose_text, escape_like_pattern,
};
use crate::db::schema::objects;
use crate::error::CacheResult;
use crate::model::object::StoredObject;

/// A text column that [`SearchExpr::Text`] can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Summary,
    Description,
    Comment,
    Location,
    Attendees,
    Organizer,
    /// Any of summary, description, comment or location. An empty value
    /// matches every component.
    Any,
}

/// A boolean condition on stored components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchExpr {
    All,
    And(Vec<SearchExpr>),
    Or(Vec<SearchExpr>),
    Not(Box<SearchExpr>),
    /// The master and every detached instance of a UID.
    Uid(String),
    Text {
        field: TextField,
        match_type: MatchType,
        value: String,
    },
    /// An attendee whose mailbox is exactly this address.
    Attendee(String),
    /// An organizer whose mailbox is exactly this address.
    Organizer(String),
    Category(String),
    Classification(String),
    Status(String),
    /// `PRIORITY` compared against the value, e.g. `(Less, 5)` for urgent.
    Priority(Ordering, u8),
    HasAlarm,
    HasStart,
    HasRecurrences,
    /// Occurrence interval overlaps `[start, end)`.
    OccursIn {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    DueIn {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    CompletedIn {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// One matching row as seen by a search visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    pub id: ComponentId,
    pub revision: String,
    /// Serialized iCalendar text.
    pub object: String,
    pub extra: Option<String>,
    pub state: OfflineState,
}

impl From<StoredObject> for SearchRow {
    fn from(row: StoredObject) -> Self {
        Self {
            id: ComponentId::from_storage_key(&row.uid),
            revision: row.revision,
            object: row.object,
            extra: row.bdata,
            state: row.state,
        }
    }
}

/// Folds a query value like the stored columns, keeping the `\n` and `\t`
/// separators the list encodings rely on.
fn fold_query_text(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    let mut segment = String::new();
    for ch in value.chars() {
        if ch == '\n' || ch == '\t' {
            folded.push_str(&decompose_text(&segment).unwrap_or_default());
            segment.clear();
            folded.push(ch);
        } else {
            segment.push(ch);
        }
    }
    folded.push_str(&decompose_text(&segment).unwrap_or_default());
    folded
}

fn always() -> ObjectPredicate {
    Box::new(objects::uid.is_not_null().nullable())
}

fn never() -> ObjectPredicate {
    Box::new(objects::uid.is_null().nullable())
}

fn text_predicate(field: TextField, match_type: MatchType, value: &str) -> ObjectPredicate {
    let folded = || build_like_pattern(&fold_query_text(value), match_type);
    match field {
        TextField::Summary => Box::new(objects::summary.like(folded()).escape('\\')),
        TextField::Description => Box::new(objects::description.like(folded()).escape('\\')),
        TextField::Comment => Box::new(objects::comment.like(folded()).escape('\\')),
        TextField::Location => Box::new(objects::location.like(folded()).escape('\\')),
        TextField::Attendees => Box::new(objects::attendees.like(folded()).escape('\\')),
        TextField::Organizer => Box::new(objects::organizer.like(folded()).escape('\\')),
        TextField::Any if value.is_empty() => always(),
        TextField::Any => {
            let pattern = folded();
            Box::new(
                objects::summary
                    .like(pattern.clone())
                    .escape('\\')
                    .or(objects::description.like(pattern.clone()).escape('\\'))
                    .or(objects::comment.like(pattern.clone()).escape('\\'))
                    .or(objects::location.like(pattern).escape('\\')),
            )
        }
    }
}

fn mailbox(address: &str) -> String {
    escape_like_pattern(&fold_query_text(strip_mailto(address)))
}

fn time_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> (String, String) {
    (encode_utc(start), encode_utc(end))
}

impl SearchExpr {
    /// Builds the SQL condition for this expression.
    pub(crate) fn to_predicate(&self) -> ObjectPredicate {
        match self {
            Self::All => always(),
            Self::And(parts) => parts
                .iter()
                .map(Self::to_predicate)
                .reduce(|acc, next| -> ObjectPredicate { Box::new(acc.and(next)) })
                .unwrap_or_else(always),
            Self::Or(parts) => parts
                .iter()
                .map(Self::to_predicate)
                .reduce(|acc, next| -> ObjectPredicate { Box::new(acc.or(next)) })
                .unwrap_or_else(never),
            Self::Not(inner) => Box::new(not(inner.to_predicate())),
            Self::Uid(uid) => object::uid_group(uid),
            Self::Text {
                field,
                match_type,
                value,
            } => text_predicate(*field, *match_type, value),
            Self::Attendee(address) => {
                let mail = mailbox(address);
                Box::new(
                    objects::attendees
                        .like(format!("%\t{mail}\n%"))
                        .escape('\\')
                        .or(objects::attendees.like(format!("%\n{mail}\n%")).escape('\\')),
                )
            }
            Self::Organizer(address) => {
                let mail = mailbox(address);
                Box::new(
                    objects::organizer
                        .like(mail.clone())
                        .escape('\\')
                        .or(objects::organizer.like(format!("%\t{mail}")).escape('\\')),
                )
            }
            Self::Category(category) => {
                let pattern = format!("%\n{}\n%", escape_like_pattern(category.trim()));
                Box::new(objects::categories.like(pattern).escape('\\'))
            }
            Self::Classification(class) => {
                Box::new(objects::classification.eq(class.trim().to_ascii_lowercase()))
            }
            Self::Status(status) => {
                Box::new(objects::status.eq(status.trim().to_ascii_uppercase()))
            }
            Self::Priority(ordering, value) => {
                let value = i32::from(*value);
                match ordering {
                    Ordering::Less => Box::new(objects::priority.lt(value)),
                    Ordering::Equal => Box::new(objects::priority.eq(value)),
                    Ordering::Greater => Box::new(objects::priority.gt(value)),
                }
            }
            Self::HasAlarm => Box::new(objects::has_alarm.eq(true).nullable()),
            Self::HasStart => Box::new(objects::has_start.eq(true).nullable()),
            Self::HasRecurrences => Box::new(objects::has_recurrences.eq(true).nullable()),
            Self::OccursIn { start, end } => {
                let (start, end) = time_bounds(*start, *end);
                Box::new(
                    objects::occur_start
                        .is_null()
                        .or(objects::occur_start.lt(end))
                        .and(objects::occur_end.is_null().or(objects::occur_end.gt(start))),
                )
            }
            Self::DueIn { start, end } => {
                let (start, end) = time_bounds(*start, *end);
                Box::new(objects::due.ge(start).and(objects::due.lt(end)))
            }
            Self::CompletedIn { start, end } => {
                let (start, end) = time_bounds(*start, *end);
                Box::new(objects::completed.ge(start).and(objects::completed.lt(end)))
            }
        }
    }
}

impl CalCache {
    /// ## Summary
    /// Calls `visit` once for every component matching `expr`, master
    /// before instances and ordered by key, until it returns
    /// [`ControlFlow::Break`]. `None` matches everything.
    ///
    /// The cache stays locked while `visit` runs, so it must not call back
    /// into this cache.
    ///
    /// ## Errors
    /// Returns `Cancelled` if cancelled before the query starts and database
    /// errors if the query fails.
    #[tracing::instrument(skip_all)]
    pub fn search_with_callback<F>(
        &self,
        expr: Option<&SearchExpr>,
        deleted: DeletedFlag,
        cancellable: Option<&Cancellable>,
        mut visit: F,
    ) -> CacheResult<()>
    where
        F: FnMut(SearchRow) -> ControlFlow<()>,
    {
        check(cancellable)?;
        let predicate = expr.map_or_else(always, SearchExpr::to_predicate);
        tracing::trace!(?expr, "Running search");

        self.store.read(|conn| {
            object::for_each_matching(conn, predicate, deleted, |row| visit(SearchRow::from(row)))
        })
    }

    fn collect_rows(
        &self,
        expr: Option<&SearchExpr>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<SearchRow>> {
        let mut rows = Vec::new();
        self.search_with_callback(expr, DeletedFlag::Exclude, cancellable, |row| {
            rows.push(row);
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    /// ## Summary
    /// Returns every component matching `expr`, parsed.
    ///
    /// ## Errors
    /// Returns database errors, or `InvalidComponent` if a stored object no
    /// longer parses.
    pub fn search(
        &self,
        expr: Option<&SearchExpr>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<Component>> {
        self.collect_rows(expr, cancellable)?
            .iter()
            .map(|row| parse_stored(&row.id.storage_key(), &row.object))
            .collect()
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn search_as_strings(
        &self,
        expr: Option<&SearchExpr>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<String>> {
        Ok(self
            .collect_rows(expr, cancellable)?
            .into_iter()
            .map(|row| row.object)
            .collect())
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn search_ids(
        &self,
        expr: Option<&SearchExpr>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<ComponentId>> {
        let mut ids = Vec::new();
        self.search_with_callback(expr, DeletedFlag::Exclude, cancellable, |row| {
            ids.push(row.id);
            ControlFlow::Continue(())
        })?;
        Ok(ids)
    }

    /// ## Summary
    /// Returns every component whose occurrences may overlap
    /// `[start, end)`. Components without a known start are always included.
    ///
    /// ## Errors
    /// As [`CalCache::search`].
    pub fn get_components_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<Component>> {
        self.search(Some(&SearchExpr::OccursIn { start, end }), cancellable)
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_components_in_range_as_strings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<String>> {
        self.search_as_strings(Some(&SearchExpr::OccursIn { start, end }), cancellable)
    }
}
