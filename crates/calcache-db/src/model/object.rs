//! Models for stored calendar objects.

use diesel::prelude::*;

use crate::db::enums::OfflineState;
use crate::db::schema::objects;

/// A stored object row without its derived columns.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = objects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoredObject {
    /// Storage key (see `ComponentId::storage_key`).
    pub uid: String,
    pub revision: String,
    /// Serialized iCalendar text.
    pub object: String,
    pub state: OfflineState,
    /// Caller-supplied side-channel data.
    pub bdata: Option<String>,
}

/// Searchable values derived from a component's content.
///
/// Times are UTC `YYYYMMDDHHMMSS` strings so that range filters are plain
/// string comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Insertable, Queryable, Selectable)]
#[diesel(table_name = objects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ColumnValues {
    pub occur_start: Option<String>,
    pub occur_end: Option<String>,
    pub due: Option<String>,
    pub completed: Option<String>,
    pub summary: Option<String>,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<String>,
    pub organizer: Option<String>,
    pub classification: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub categories: Option<String>,
    pub has_alarm: bool,
    pub has_start: bool,
    pub has_recurrences: bool,
}

/// A complete row for insert-or-replace.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = objects)]
pub struct NewObject<'a> {
    pub uid: &'a str,
    pub revision: &'a str,
    pub object: &'a str,
    pub state: OfflineState,
    pub bdata: Option<&'a str>,
    #[diesel(embed)]
    pub columns: ColumnValues,
}

/// A row whose state is not `Synced`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = objects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OfflineChange {
    pub uid: String,
    pub revision: String,
    pub state: OfflineState,
}
