//! Row-level operations on `objects`.
//!
//! These run on a borrowed connection and never open a transaction of their
//! own; callers wrap writes in `with_write_transaction`.

use std::ops::ControlFlow;

use diesel::connection::DefaultLoadingMode;
use diesel::expression::BoxableExpression;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Nullable};
use diesel::sqlite::Sqlite;

use crate::db::connection::DbConnection;
use crate::db::enums::{DeletedFlag, OfflineFlag, OfflineState};
use crate::db::schema::objects;
use crate::error::{CacheError, CacheResult};
use crate::model::object::{ColumnValues, NewObject, OfflineChange, StoredObject};

type BoxedObjects<'a> = objects::BoxedQuery<'a, Sqlite>;

/// A `WHERE` condition over `objects`, built at runtime.
pub type ObjectPredicate = Box<dyn BoxableExpression<objects::table, Sqlite, SqlType = Nullable<Bool>>>;

fn visible<'a>(deleted: DeletedFlag) -> BoxedObjects<'a> {
    let query = objects::table.into_boxed();
    if deleted.includes_deleted() {
        query
    } else {
        query.filter(objects::state.ne(OfflineState::LocallyDeleted))
    }
}

fn not_found(key: &str) -> CacheError {
    CacheError::NotFound(format!("object '{}'", key.replace('\n', "', '")))
}

/// ## Summary
/// Returns the offline state of a row, including deleted ones.
///
/// ## Errors
/// Returns database errors if the query fails.
pub fn get_state(conn: &mut DbConnection, key: &str) -> CacheResult<Option<OfflineState>> {
    Ok(objects::table
        .find(key)
        .select(objects::state)
        .first::<OfflineState>(conn)
        .optional()?)
}

/// Input for [`put`].
#[derive(Debug, Clone, Copy)]
pub struct PutObject<'a> {
    pub key: &'a str,
    pub revision: &'a str,
    pub object: &'a str,
    pub extra: Option<&'a str>,
}

/// ## Summary
/// Inserts or replaces a row together with its derived columns.
///
/// Returns the offline state the row was written with.
///
/// ## Errors
/// Returns database errors if the write fails.
#[tracing::instrument(skip(conn, input, columns), fields(key = %input.key))]
pub fn put(
    conn: &mut DbConnection,
    input: PutObject<'_>,
    columns: ColumnValues,
    flag: OfflineFlag,
) -> CacheResult<OfflineState> {
    let existing = match flag {
        OfflineFlag::Online => None,
        OfflineFlag::Offline => get_state(conn, input.key)?,
    };
    let state = OfflineState::after_put(existing, flag);

    let row = NewObject {
        uid: input.key,
        revision: input.revision,
        object: input.object,
        state,
        bdata: input.extra,
        columns,
    };
    diesel::replace_into(objects::table)
        .values(&row)
        .execute(conn)?;

    tracing::debug!(state = %state, "Stored object");

    Ok(state)
}

/// ## Summary
/// Loads a row by key.
///
/// ## Errors
/// Returns `NotFound` if no such row is visible.
pub fn get(conn: &mut DbConnection, key: &str, deleted: DeletedFlag) -> CacheResult<StoredObject> {
    visible(deleted)
        .filter(objects::uid.eq(key))
        .select(StoredObject::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found(key))
}

/// ## Summary
/// Loads the derived columns of a row.
///
/// ## Errors
/// Returns `NotFound` if the row does not exist.
pub fn get_columns(conn: &mut DbConnection, key: &str) -> CacheResult<ColumnValues> {
    objects::table
        .find(key)
        .select(ColumnValues::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found(key))
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn contains(conn: &mut DbConnection, key: &str, deleted: DeletedFlag) -> CacheResult<bool> {
    let count: i64 = visible(deleted)
        .filter(objects::uid.eq(key))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// ## Summary
/// Matches the master row of `uid` and every instance row whose key has `uid`
/// plus the delimiter as prefix.
///
/// Instance keys are matched as the byte range `[uid "\n", uid "\x0B")` under
/// the column's binary collation, so UIDs differing only in case stay apart.
#[must_use]
pub fn uid_group(uid: &str) -> ObjectPredicate {
    let lower = format!("{uid}\n");
    let upper = format!("{uid}\u{b}");
    Box::new(
        objects::uid
            .eq(uid.to_string())
            .or(objects::uid.ge(lower).and(objects::uid.lt(upper)))
            .nullable(),
    )
}

/// ## Summary
/// Loads the master row stored under `uid` and every instance row whose key
/// has `uid` plus the delimiter as prefix, ordered by key.
///
/// ## Errors
/// Returns database errors if the query fails.
pub fn get_all_for_uid(
    conn: &mut DbConnection,
    uid: &str,
    deleted: DeletedFlag,
) -> CacheResult<Vec<StoredObject>> {
    Ok(visible(deleted)
        .filter(uid_group(uid))
        .order(objects::uid.asc())
        .select(StoredObject::as_select())
        .load(conn)?)
}

/// ## Summary
/// Streams every visible row matching `predicate`, ordered by key, into
/// `visit` until it breaks.
///
/// The connection stays borrowed while `visit` runs.
///
/// ## Errors
/// Returns database errors if the query or a row load fails.
pub fn for_each_matching<F>(
    conn: &mut DbConnection,
    predicate: ObjectPredicate,
    deleted: DeletedFlag,
    mut visit: F,
) -> CacheResult<()>
where
    F: FnMut(StoredObject) -> ControlFlow<()>,
{
    let rows = visible(deleted)
        .filter(predicate)
        .order(objects::uid.asc())
        .select(StoredObject::as_select())
        .load_iter::<StoredObject, DefaultLoadingMode>(conn)?;

    for row in rows {
        if visit(row?).is_break() {
            tracing::trace!("Search stopped by visitor");
            break;
        }
    }
    Ok(())
}

/// ## Summary
/// Removes a row according to `flag`.
///
/// Online, the row is deleted. Offline, a row created while offline is
/// deleted outright and any other row is kept as `LocallyDeleted`.
///
/// ## Errors
/// Returns `NotFound` if no row exists under `key`.
#[tracing::instrument(skip(conn))]
pub fn remove(conn: &mut DbConnection, key: &str, flag: OfflineFlag) -> CacheResult<()> {
    let state = get_state(conn, key)?.ok_or_else(|| not_found(key))?;

    if flag == OfflineFlag::Online || state == OfflineState::LocallyCreated {
        diesel::delete(objects::table.find(key)).execute(conn)?;
        tracing::debug!("Deleted object");
    } else {
        set_offline_state(conn, key, OfflineState::LocallyDeleted)?;
        tracing::debug!("Marked object locally deleted");
    }

    Ok(())
}

/// ## Summary
/// Deletes every row, including locally deleted ones.
///
/// ## Errors
/// Returns database errors if the delete fails.
pub fn remove_all(conn: &mut DbConnection) -> CacheResult<usize> {
    Ok(diesel::delete(objects::table).execute(conn)?)
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn count(conn: &mut DbConnection, deleted: DeletedFlag) -> CacheResult<i64> {
    Ok(visible(deleted).count().get_result(conn)?)
}

/// ## Summary
/// Lists every storage key, ordered.
///
/// ## Errors
/// Returns database errors if the query fails.
pub fn get_keys(conn: &mut DbConnection, deleted: DeletedFlag) -> CacheResult<Vec<String>> {
    Ok(visible(deleted)
        .select(objects::uid)
        .order(objects::uid.asc())
        .load(conn)?)
}

/// ## Errors
/// Returns `NotFound` if no row exists under `key`.
pub fn get_extra(conn: &mut DbConnection, key: &str) -> CacheResult<Option<String>> {
    objects::table
        .find(key)
        .select(objects::bdata)
        .first::<Option<String>>(conn)
        .optional()?
        .ok_or_else(|| not_found(key))
}

/// ## Errors
/// Returns `NotFound` if no row exists under `key`.
pub fn set_extra(conn: &mut DbConnection, key: &str, extra: Option<&str>) -> CacheResult<()> {
    let updated = diesel::update(objects::table.find(key))
        .set(objects::bdata.eq(extra))
        .execute(conn)?;
    if updated == 0 {
        return Err(not_found(key));
    }
    Ok(())
}

/// ## Errors
/// Returns `NotFound` if no row exists under `key`.
pub fn get_offline_state(conn: &mut DbConnection, key: &str) -> CacheResult<OfflineState> {
    get_state(conn, key)?.ok_or_else(|| not_found(key))
}

/// ## Errors
/// Returns `NotFound` if no row exists under `key`.
pub fn set_offline_state(
    conn: &mut DbConnection,
    key: &str,
    state: OfflineState,
) -> CacheResult<()> {
    let updated = diesel::update(objects::table.find(key))
        .set(objects::state.eq(state))
        .execute(conn)?;
    if updated == 0 {
        return Err(not_found(key));
    }
    Ok(())
}

/// ## Summary
/// Lists rows with unreconciled local changes, ordered by key.
///
/// ## Errors
/// Returns database errors if the query fails.
pub fn get_offline_changes(conn: &mut DbConnection) -> CacheResult<Vec<OfflineChange>> {
    Ok(objects::table
        .filter(objects::state.ne(OfflineState::Synced))
        .order(objects::uid.asc())
        .select(OfflineChange::as_select())
        .load(conn)?)
}

/// ## Summary
/// Drops locally deleted rows and marks every other row `Synced`.
///
/// ## Errors
/// Returns database errors if a write fails.
pub fn clear_offline_changes(conn: &mut DbConnection) -> CacheResult<()> {
    diesel::delete(objects::table.filter(objects::state.eq(OfflineState::LocallyDeleted)))
        .execute(conn)?;
    diesel::update(objects::table.filter(objects::state.ne(OfflineState::Synced)))
        .set(objects::state.eq(OfflineState::Synced))
        .execute(conn)?;
    Ok(())
}
