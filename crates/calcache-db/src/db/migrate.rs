//! Schema creation and upgrade.
//!
//! The embedded diesel migrations create the baseline tables. On every open
//! the `objects` table is then checked for missing derived columns and
//! indexes, and the stored version is brought up to [`CACHE_VERSION`], all
//! in one immediate transaction.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::db::connection::DbConnection;
use crate::db::query::keys;
use crate::db::transaction::with_write_transaction;
use crate::error::{CacheError, CacheResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Schema version this code reads and writes.
pub const CACHE_VERSION: i32 = 1;

/// A derived column of `objects`, with its declared type and optional index.
pub struct DerivedColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub index: Option<&'static str>,
}

const fn column(
    name: &'static str,
    sql_type: &'static str,
    index: Option<&'static str>,
) -> DerivedColumn {
    DerivedColumn {
        name,
        sql_type,
        index,
    }
}

pub const DERIVED_COLUMNS: &[DerivedColumn] = &[
    column("occur_start", "TEXT", Some("IDX_OCCURSTART")),
    column("occur_end", "TEXT", Some("IDX_OCCUREND")),
    column("due", "TEXT", Some("IDX_DUE")),
    column("completed", "TEXT", Some("IDX_COMPLETED")),
    column("summary", "TEXT", Some("IDX_SUMMARY")),
    column("comment", "TEXT", None),
    column("description", "TEXT", None),
    column("location", "TEXT", None),
    column("attendees", "TEXT", None),
    column("organizer", "TEXT", None),
    column("classification", "TEXT", None),
    column("status", "TEXT", None),
    column("priority", "INTEGER", None),
    column("categories", "TEXT", None),
    column("has_alarm", "INTEGER NOT NULL DEFAULT 0", None),
    column("has_start", "INTEGER NOT NULL DEFAULT 0", None),
    column("has_recurrences", "INTEGER NOT NULL DEFAULT 0", None),
    column("bdata", "TEXT", None),
];

#[derive(QueryableByName)]
struct TableColumn {
    #[diesel(sql_type = Text)]
    name: String,
}

/// ## Summary
/// Brings the schema of an opened cache file up to date.
///
/// ## Errors
/// Returns `SchemaError` if the file was written by a newer version or a
/// migration cannot be applied. Nothing is changed in that case.
#[tracing::instrument(skip(conn))]
pub fn migrate(conn: &mut DbConnection) -> CacheResult<()> {
    with_write_transaction(conn, |conn| {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| CacheError::SchemaError(format!("failed to run migrations: {e}")))?;
        if !applied.is_empty() {
            tracing::debug!(count = applied.len(), "Applied embedded migrations");
        }

        let stored = keys::get_version(conn)?;
        if stored > CACHE_VERSION {
            return Err(CacheError::SchemaError(format!(
                "cache version {stored} is newer than supported version {CACHE_VERSION}"
            )));
        }

        add_missing_columns(conn)?;
        create_indexes(conn)?;

        if stored < CACHE_VERSION {
            upgrade_data(conn, stored)?;
            keys::set_version(conn, CACHE_VERSION)?;
            tracing::info!(from = stored, to = CACHE_VERSION, "Cache schema upgraded");
        }

        Ok(())
    })
}

fn add_missing_columns(conn: &mut DbConnection) -> CacheResult<()> {
    let existing: Vec<String> = diesel::sql_query("PRAGMA table_info(objects)")
        .load::<TableColumn>(conn)?
        .into_iter()
        .map(|c| c.name)
        .collect();

    for col in DERIVED_COLUMNS {
        if existing.iter().any(|name| name.eq_ignore_ascii_case(col.name)) {
            continue;
        }
        tracing::debug!(column = col.name, "Adding missing column");
        conn.batch_execute(&format!(
            "ALTER TABLE objects ADD COLUMN {} {}",
            col.name, col.sql_type
        ))?;
    }

    Ok(())
}

fn create_indexes(conn: &mut DbConnection) -> CacheResult<()> {
    for col in DERIVED_COLUMNS {
        if let Some(index) = col.index {
            conn.batch_execute(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON objects ({})",
                col.name
            ))?;
        }
    }
    Ok(())
}

/// Rewrites stored data for versions before [`CACHE_VERSION`]. Version 1 is
/// the baseline layout, so there is nothing to convert yet.
fn upgrade_data(_conn: &mut DbConnection, from_version: i32) -> CacheResult<()> {
    if from_version < 1 {
        tracing::debug!("Initializing fresh cache");
    }
    Ok(())
}
