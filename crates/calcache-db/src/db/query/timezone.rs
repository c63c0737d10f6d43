//! Operations on the `timezones` side table.

use diesel::prelude::*;

use crate::db::connection::DbConnection;
use crate::db::schema::timezones;
use crate::error::CacheResult;
use crate::model::timezone::{NewTimezone, StoredTimezone};

/// ## Summary
/// Inserts or replaces a timezone definition.
///
/// ## Errors
/// Returns database errors if the write fails.
pub fn put(conn: &mut DbConnection, tzid: &str, zone: &str) -> CacheResult<()> {
    diesel::replace_into(timezones::table)
        .values(&NewTimezone { tzid, zone })
        .execute(conn)?;
    Ok(())
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn get(conn: &mut DbConnection, tzid: &str) -> CacheResult<Option<StoredTimezone>> {
    Ok(timezones::table
        .find(tzid)
        .select(StoredTimezone::as_select())
        .first(conn)
        .optional()?)
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn count(conn: &mut DbConnection) -> CacheResult<i64> {
    Ok(timezones::table.count().get_result(conn)?)
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn list(conn: &mut DbConnection) -> CacheResult<Vec<StoredTimezone>> {
    Ok(timezones::table
        .order(timezones::tzid.asc())
        .select(StoredTimezone::as_select())
        .load(conn)?)
}

/// ## Errors
/// Returns database errors if the delete fails.
pub fn remove_all(conn: &mut DbConnection) -> CacheResult<usize> {
    Ok(diesel::delete(timezones::table).execute(conn)?)
}
