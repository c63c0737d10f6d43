//! The keyed object store the calendar cache is layered on.
//!
//! One SQLite connection sits behind a mutex. Reads run directly on it;
//! writes run in an immediate transaction and bump the cache revision before
//! committing, so a reader never sees a write without its new revision.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::db::connection::{DbConnection, establish};
use crate::db::enums::{DeletedFlag, OfflineFlag, OfflineState};
use crate::db::migrate::migrate;
use crate::db::query::keys::{self, RevisionClock};
use crate::db::query::object::{self, PutObject};
use crate::db::transaction::with_write_transaction;
use crate::error::{CacheError, CacheResult};
use crate::model::object::{ColumnValues, OfflineChange, StoredObject};

struct StoreInner {
    conn: DbConnection,
    clock: RevisionClock,
}

pub struct ObjectStore {
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore").finish_non_exhaustive()
    }
}

impl ObjectStore {
    /// ## Summary
    /// Opens the store file at `path`, creating and migrating it as needed.
    ///
    /// ## Errors
    /// Returns `IOFailure` if the file cannot be opened and `SchemaError` if
    /// it cannot be migrated.
    pub fn open(path: &Path) -> CacheResult<Self> {
        Self::from_connection(establish(path)?)
    }

    /// ## Summary
    /// Wraps an already established connection, migrating its schema.
    ///
    /// ## Errors
    /// Returns `SchemaError` if the schema cannot be migrated.
    pub fn from_connection(mut conn: DbConnection) -> CacheResult<Self> {
        migrate(&mut conn)?;
        let clock = RevisionClock::resume(keys::get_revision(&mut conn)?.as_deref());
        Ok(Self {
            inner: Mutex::new(StoreInner { conn, clock }),
        })
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|e| CacheError::IOFailure(format!("store lock poisoned: {e}")))
    }

    /// ## Summary
    /// Runs `f` on the connection without opening a transaction.
    ///
    /// ## Errors
    /// Returns whatever `f` returns.
    pub fn read<T, F>(&self, f: F) -> CacheResult<T>
    where
        F: FnOnce(&mut DbConnection) -> CacheResult<T>,
    {
        let mut guard = self.lock()?;
        f(&mut guard.conn)
    }

    /// ## Summary
    /// Runs `f` inside an immediate transaction and records a new cache
    /// revision before committing.
    ///
    /// ## Errors
    /// Returns whatever `f` returns; the transaction is rolled back.
    pub fn write<T, F>(&self, f: F) -> CacheResult<T>
    where
        F: FnOnce(&mut DbConnection) -> CacheResult<T>,
    {
        let mut guard = self.lock()?;
        let StoreInner { conn, clock } = &mut *guard;
        with_write_transaction(conn, |conn| {
            let value = f(conn)?;
            keys::change_revision(conn, clock)?;
            Ok(value)
        })
    }

    /// ## Errors
    /// Returns database errors if the write fails.
    pub fn put(
        &self,
        input: PutObject<'_>,
        columns: ColumnValues,
        flag: OfflineFlag,
    ) -> CacheResult<OfflineState> {
        self.write(|conn| object::put(conn, input, columns, flag))
    }

    /// ## Summary
    /// Returns the payload stored under `key`.
    ///
    /// ## Errors
    /// Returns `NotFound` if no such row is visible.
    pub fn get(&self, key: &str, deleted: DeletedFlag) -> CacheResult<String> {
        self.read(|conn| object::get(conn, key, deleted)).map(|row| row.object)
    }

    /// ## Summary
    /// Returns the payload and the extra data stored under `key`.
    ///
    /// ## Errors
    /// Returns `NotFound` if no such row is visible.
    pub fn get_with_extra(
        &self,
        key: &str,
        deleted: DeletedFlag,
    ) -> CacheResult<(String, Option<String>)> {
        self.read(|conn| object::get(conn, key, deleted))
            .map(|row| (row.object, row.bdata))
    }

    /// ## Errors
    /// Returns `NotFound` if no such row is visible.
    pub fn get_row(&self, key: &str, deleted: DeletedFlag) -> CacheResult<StoredObject> {
        self.read(|conn| object::get(conn, key, deleted))
    }

    /// ## Summary
    /// Returns the derived search columns stored under `key`.
    ///
    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn get_columns(&self, key: &str) -> CacheResult<ColumnValues> {
        self.read(|conn| object::get_columns(conn, key))
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn contains(&self, key: &str, deleted: DeletedFlag) -> CacheResult<bool> {
        self.read(|conn| object::contains(conn, key, deleted))
    }

    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn remove(&self, key: &str, flag: OfflineFlag) -> CacheResult<()> {
        self.write(|conn| object::remove(conn, key, flag))
    }

    /// ## Errors
    /// Returns database errors if the delete fails.
    pub fn remove_all(&self) -> CacheResult<usize> {
        self.write(object::remove_all)
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_count(&self, deleted: DeletedFlag) -> CacheResult<i64> {
        self.read(|conn| object::count(conn, deleted))
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_uids(&self, deleted: DeletedFlag) -> CacheResult<Vec<String>> {
        self.read(|conn| object::get_keys(conn, deleted))
    }

    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn get_extra(&self, key: &str) -> CacheResult<Option<String>> {
        self.read(|conn| object::get_extra(conn, key))
    }

    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn set_extra(&self, key: &str, extra: Option<&str>) -> CacheResult<()> {
        self.write(|conn| object::set_extra(conn, key, extra))
    }

    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn get_offline_state(&self, key: &str) -> CacheResult<OfflineState> {
        self.read(|conn| object::get_offline_state(conn, key))
    }

    /// ## Errors
    /// Returns `NotFound` if no row exists under `key`.
    pub fn set_offline_state(&self, key: &str, state: OfflineState) -> CacheResult<()> {
        self.write(|conn| object::set_offline_state(conn, key, state))
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_offline_changes(&self) -> CacheResult<Vec<OfflineChange>> {
        self.read(object::get_offline_changes)
    }

    /// ## Errors
    /// Returns database errors if a write fails.
    pub fn clear_offline_changes(&self) -> CacheResult<()> {
        self.write(object::clear_offline_changes)
    }

    /// ## Errors
    /// Returns `SchemaError` if the stored value is not a number.
    pub fn get_version(&self) -> CacheResult<i32> {
        self.read(keys::get_version)
    }

    /// ## Errors
    /// Returns database errors if the write fails.
    pub fn set_version(&self, version: i32) -> CacheResult<()> {
        self.write(|conn| keys::set_version(conn, version))
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_revision(&self) -> CacheResult<Option<String>> {
        self.read(keys::get_revision)
    }

    /// ## Summary
    /// Records a new cache revision without changing anything else.
    ///
    /// ## Errors
    /// Returns database errors if the write fails.
    pub fn change_revision(&self) -> CacheResult<String> {
        let mut guard = self.lock()?;
        let StoreInner { conn, clock } = &mut *guard;
        with_write_transaction(conn, |conn| keys::change_revision(conn, clock))
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_key(&self, name: &str) -> CacheResult<Option<String>> {
        self.read(|conn| keys::get_key(conn, name))
    }

    /// ## Errors
    /// Returns database errors if the write fails.
    pub fn set_key(&self, name: &str, value: &str) -> CacheResult<()> {
        self.write(|conn| keys::set_key(conn, name, value))
    }
}
