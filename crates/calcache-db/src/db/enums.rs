//! Database enum types with Diesel serialization.
//!
//! Enums are stored as small integers in `SQLite`; each implements `ToSql`
//! and `FromSql` so rows load straight into typed values.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Integer;
use diesel::sqlite::{Sqlite, SqliteValue};
use std::fmt;

/// Reconciliation state of a stored object against its remote source.
///
/// Maps to `objects.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Integer)]
pub enum OfflineState {
    Unknown = 0,
    Synced = 1,
    LocallyCreated = 2,
    LocallyModified = 3,
    LocallyDeleted = 4,
}

impl ToSql<Integer, Sqlite> for OfflineState {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(*self as i32);
        Ok(IsNull::No)
    }
}

impl FromSql<Integer, Sqlite> for OfflineState {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        match <i32 as FromSql<Integer, Sqlite>>::from_sql(bytes)? {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Synced),
            2 => Ok(Self::LocallyCreated),
            3 => Ok(Self::LocallyModified),
            4 => Ok(Self::LocallyDeleted),
            other => Err(format!("Unrecognized offline state {other}").into()),
        }
    }
}

impl OfflineState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Synced => "synced",
            Self::LocallyCreated => "locally-created",
            Self::LocallyModified => "locally-modified",
            Self::LocallyDeleted => "locally-deleted",
        }
    }

    /// State a row takes after a write, given its current state.
    #[must_use]
    pub const fn after_put(existing: Option<Self>, flag: OfflineFlag) -> Self {
        match (flag, existing) {
            (OfflineFlag::Online, _) => Self::Synced,
            (OfflineFlag::Offline, None | Some(Self::LocallyCreated)) => Self::LocallyCreated,
            (OfflineFlag::Offline, Some(_)) => Self::LocallyModified,
        }
    }
}

impl fmt::Display for OfflineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a write happens while connected to the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OfflineFlag {
    #[default]
    Online,
    Offline,
}

/// Whether reads include rows removed while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeletedFlag {
    #[default]
    Exclude,
    Include,
}

impl DeletedFlag {
    #[must_use]
    pub const fn includes_deleted(self) -> bool {
        matches!(self, Self::Include)
    }
}
