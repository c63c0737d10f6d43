//! Key/value rows: schema version and the cache-wide revision.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::connection::DbConnection;
use crate::db::schema::keys;
use crate::error::{CacheError, CacheResult};

pub const VERSION_KEY: &str = "version";
pub const REVISION_KEY: &str = "revision";

/// ## Summary
/// Reads a key's value.
///
/// ## Errors
/// Returns database errors if the query fails.
pub fn get_key(conn: &mut DbConnection, name: &str) -> CacheResult<Option<String>> {
    Ok(keys::table
        .filter(keys::key.eq(name))
        .select(keys::value)
        .first::<String>(conn)
        .optional()?)
}

/// ## Summary
/// Inserts or replaces a key's value.
///
/// ## Errors
/// Returns database errors if the write fails.
pub fn set_key(conn: &mut DbConnection, name: &str, value: &str) -> CacheResult<()> {
    diesel::replace_into(keys::table)
        .values((keys::key.eq(name), keys::value.eq(value)))
        .execute(conn)?;
    Ok(())
}

/// ## Summary
/// Returns the stored schema version, `0` for a fresh file.
///
/// ## Errors
/// Returns `SchemaError` if the stored value is not a number.
pub fn get_version(conn: &mut DbConnection) -> CacheResult<i32> {
    match get_key(conn, VERSION_KEY)? {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|e| CacheError::SchemaError(format!("stored version '{raw}': {e}"))),
    }
}

/// ## Errors
/// Returns database errors if the write fails.
pub fn set_version(conn: &mut DbConnection, version: i32) -> CacheResult<()> {
    set_key(conn, VERSION_KEY, &version.to_string())
}

/// ## Errors
/// Returns database errors if the query fails.
pub fn get_revision(conn: &mut DbConnection) -> CacheResult<Option<String>> {
    get_key(conn, REVISION_KEY)
}

/// Produces cache revisions of the form `2026-01-23T12:00:00Z(3)`.
///
/// The counter restarts whenever the second changes.
#[derive(Debug, Default)]
pub struct RevisionClock {
    last_second: i64,
    counter: u32,
}

impl RevisionClock {
    /// ## Summary
    /// Continues after a revision read back from the store, so a cache
    /// reopened within the same second never repeats it.
    ///
    /// A missing or unreadable revision starts a fresh clock.
    #[must_use]
    pub fn resume(stored: Option<&str>) -> Self {
        let parsed = stored.and_then(|revision| {
            let (time, rest) = revision.split_once('(')?;
            let counter = rest.strip_suffix(')')?.parse::<u32>().ok()?;
            let second = DateTime::parse_from_rfc3339(time).ok()?.timestamp();
            Some(Self {
                last_second: second,
                counter: counter.saturating_add(1),
            })
        });
        parsed.unwrap_or_default()
    }

    #[must_use]
    pub fn next_revision(&mut self, now: DateTime<Utc>) -> String {
        let second = now.timestamp();
        if second != self.last_second {
            self.last_second = second;
            self.counter = 0;
        }

        let revision = format!("{}({})", now.format("%Y-%m-%dT%H:%M:%SZ"), self.counter);
        self.counter += 1;
        revision
    }
}

/// ## Summary
/// Stores a fresh cache revision.
///
/// ## Errors
/// Returns database errors if the write fails.
pub fn change_revision(conn: &mut DbConnection, clock: &mut RevisionClock) -> CacheResult<String> {
    let revision = clock.next_revision(Utc::now());
    set_key(conn, REVISION_KEY, &revision)?;
    tracing::trace!(revision = %revision, "Cache revision changed");
    Ok(revision)
}
