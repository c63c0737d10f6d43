//! Models for the timezone side table.

use diesel::prelude::*;

use crate::db::schema::timezones;

/// Stored VTIMEZONE definition.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = timezones)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoredTimezone {
    /// Timezone identifier (e.g., `America/New_York`).
    pub tzid: String,
    /// Full VTIMEZONE component text.
    pub zone: String,
}

/// New timezone for insert-or-replace.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = timezones)]
pub struct NewTimezone<'a> {
    pub tzid: &'a str,
    pub zone: &'a str,
}
