//! Transaction helper utilities for database operations.
//!
//! ## Usage
//!
//! Writes go through [`with_write_transaction`], which takes the `SQLite`
//! write lock up front (`BEGIN IMMEDIATE`) so the transaction never has to
//! upgrade a read lock half way through:
//!
//! ```rust,ignore
//! with_write_transaction(conn, |conn| {
//!     query::object::put(conn, &row, OfflineFlag::Online)?;
//!     query::keys::change_revision(conn, &mut clock)?;
//!     Ok(())
//! })?;
//! ```

use crate::db::connection::DbConnection;
use crate::error::CacheError;

/// ## Summary
/// Runs `callback` inside an immediate transaction and returns its result.
///
/// ## Errors
/// Returns any error produced by the closure, or errors raised while starting
/// or committing the transaction. The transaction is rolled back on error.
pub fn with_write_transaction<T, F>(conn: &mut DbConnection, callback: F) -> Result<T, CacheError>
where
    F: FnOnce(&mut DbConnection) -> Result<T, CacheError>,
{
    conn.immediate_transaction::<T, CacheError, F>(callback)
}
