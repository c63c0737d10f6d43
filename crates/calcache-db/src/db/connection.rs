use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;

use crate::error::CacheResult;

pub type DbConnection = SqliteConnection;

/// Milliseconds a writer waits on another connection's lock before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// ## Summary
/// Opens (creating if needed) the cache file at `path`.
///
/// ## Errors
/// Returns `IOFailure` if the file cannot be opened or configured.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn establish(path: &Path) -> CacheResult<DbConnection> {
    tracing::debug!("Opening cache database");

    let mut conn = SqliteConnection::establish(&path.to_string_lossy())?;
    conn.batch_execute(&format!(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))?;

    tracing::info!("Cache database opened");

    Ok(conn)
}
