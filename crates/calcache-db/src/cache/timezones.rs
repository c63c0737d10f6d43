//! The VTIMEZONE table and its in-memory read-through map.
//!
//! Lock order is always store, then map. A lookup that hits the map never
//! touches the store.

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard};

use calcache_rfc::rfc::ical::core::{Component, ComponentKind};
use calcache_rfc::rfc::ical::expand::{TimezoneSource, VTimezone, VTimezoneError};
use calcache_rfc::rfc::ical::{parse_component, serialize_component};

use super::cancel::check;
use super::{CalCache, Cancellable, TimezoneMap};
use crate::db::connection::DbConnection;
use crate::db::query::timezone;
use crate::error::{CacheError, CacheResult};

fn lock_map(map: &TimezoneMap) -> CacheResult<MutexGuard<'_, HashMap<String, Arc<VTimezone>>>> {
    map.lock()
        .map_err(|e| CacheError::IOFailure(format!("timezone map lock poisoned: {e}")))
}

fn cached(map: &TimezoneMap, tzid: &str) -> CacheResult<Option<Arc<VTimezone>>> {
    Ok(lock_map(map)?.get(tzid).map(Arc::clone))
}

fn parse_zone(tzid: &str, text: &str) -> CacheResult<Arc<VTimezone>> {
    let component = parse_component(text).map_err(|e| {
        CacheError::InvalidComponent(format!("stored timezone '{tzid}' does not parse: {e}"))
    })?;
    let zone = VTimezone::parse(&component).map_err(|e| {
        CacheError::InvalidComponent(format!("stored timezone '{tzid}' is unusable: {e}"))
    })?;
    Ok(Arc::new(zone))
}

/// Reads through the map into the `timezones` table on `conn`.
fn load(conn: &mut DbConnection, map: &TimezoneMap, tzid: &str) -> CacheResult<Option<Arc<VTimezone>>> {
    if let Some(found) = cached(map, tzid)? {
        return Ok(Some(found));
    }

    let Some(row) = timezone::get(conn, tzid)? else {
        return Ok(None);
    };
    let parsed = parse_zone(tzid, &row.zone)?;

    // Another reader may have won the race; keep whichever came first.
    let mut guard = lock_map(map)?;
    Ok(Some(Arc::clone(
        guard.entry(tzid.to_string()).or_insert(parsed),
    )))
}

/// Resolves TZIDs for a write in progress, on that write's connection.
pub(super) struct StoreTimezoneSource<'a> {
    conn: &'a mut DbConnection,
    map: &'a TimezoneMap,
}

impl<'a> StoreTimezoneSource<'a> {
    pub(super) fn new(conn: &'a mut DbConnection, map: &'a TimezoneMap) -> Self {
        Self { conn, map }
    }
}

impl TimezoneSource for StoreTimezoneSource<'_> {
    fn find_vtimezone(&mut self, tzid: &str) -> Option<Arc<VTimezone>> {
        match load(self.conn, self.map, tzid) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(tzid, error = %err, "Timezone lookup failed");
                None
            }
        }
    }
}

/// A validated VTIMEZONE ready to be written.
pub(super) struct ZoneRow<'a> {
    tzid: &'a str,
    text: String,
}

impl<'a> ZoneRow<'a> {
    /// ## Errors
    /// Returns `MissingIdentifier` if the component has no TZID and
    /// `MissingDefinition` if it is not a usable VTIMEZONE.
    pub(super) fn validate(zone: &'a Component) -> CacheResult<Self> {
        let tzid = zone
            .get_property("TZID")
            .and_then(|p| p.as_text())
            .map(str::trim)
            .filter(|tzid| !tzid.is_empty())
            .ok_or(CacheError::MissingIdentifier)?;

        if zone.kind != ComponentKind::Timezone {
            return Err(CacheError::MissingDefinition(tzid.to_string()));
        }
        match VTimezone::parse(zone) {
            Ok(_) => {}
            Err(VTimezoneError::MissingTzid) => return Err(CacheError::MissingIdentifier),
            Err(err) => {
                tracing::debug!(tzid, error = %err, "Rejecting timezone");
                return Err(CacheError::MissingDefinition(tzid.to_string()));
            }
        }

        Ok(Self {
            tzid,
            text: serialize_component(zone),
        })
    }

    pub(super) fn write(&self, conn: &mut DbConnection) -> CacheResult<()> {
        timezone::put(conn, self.tzid, &self.text)?;
        tracing::debug!(tzid = self.tzid, "Stored timezone");
        Ok(())
    }
}

impl CalCache {
    /// ## Summary
    /// Stores a VTIMEZONE, replacing any definition with the same TZID.
    ///
    /// A timezone already parsed into memory keeps its old definition for
    /// the life of this cache.
    ///
    /// ## Errors
    /// Returns `MissingIdentifier` if the component has no TZID and
    /// `MissingDefinition` if it is not a usable VTIMEZONE.
    #[tracing::instrument(skip_all)]
    pub fn put_timezone(&self, zone: &Component, cancellable: Option<&Cancellable>) -> CacheResult<()> {
        check(cancellable)?;
        let row = ZoneRow::validate(zone)?;
        self.store.write(|conn| row.write(conn))
    }

    /// ## Summary
    /// Returns the parsed timezone for `tzid`, loading and remembering it on
    /// first use.
    ///
    /// ## Errors
    /// Returns `NotFound` if no such timezone is stored.
    pub fn get_timezone(
        &self,
        tzid: &str,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Arc<VTimezone>> {
        check(cancellable)?;

        if let Some(found) = cached(&self.timezones, tzid)? {
            return Ok(found);
        }

        self.store
            .read(|conn| load(conn, &self.timezones, tzid))?
            .ok_or_else(|| CacheError::NotFound(format!("timezone '{tzid}'")))
    }

    /// ## Summary
    /// Returns the stored definition of `tzid` as VTIMEZONE text.
    ///
    /// ## Errors
    /// Returns `NotFound` if no such timezone is stored.
    pub fn dup_timezone_as_string(
        &self,
        tzid: &str,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<String> {
        Ok(self.get_timezone(tzid, cancellable)?.to_ical_string())
    }

    /// ## Summary
    /// Returns every known timezone, ordered by TZID.
    ///
    /// The table is only re-read when its row count differs from the number
    /// of timezones in memory.
    ///
    /// ## Errors
    /// Returns database errors if the table cannot be read.
    pub fn list_timezones(&self, cancellable: Option<&Cancellable>) -> CacheResult<Vec<Arc<VTimezone>>> {
        check(cancellable)?;

        self.store.read(|conn| {
            let stored = timezone::count(conn)?;
            let known = lock_map(&self.timezones)?.len();
            if usize::try_from(stored).ok() == Some(known) {
                return Ok(());
            }

            tracing::debug!(stored, known, "Reloading timezone table");
            for row in timezone::list(conn)? {
                if cached(&self.timezones, &row.tzid)?.is_some() {
                    continue;
                }
                match parse_zone(&row.tzid, &row.zone) {
                    Ok(parsed) => {
                        lock_map(&self.timezones)?
                            .entry(row.tzid)
                            .or_insert(parsed);
                    }
                    Err(err) => tracing::warn!(tzid = %row.tzid, error = %err, "Skipping stored timezone"),
                }
            }
            Ok(())
        })?;

        let mut zones: Vec<Arc<VTimezone>> = lock_map(&self.timezones)?.values().cloned().collect();
        zones.sort_by(|a, b| a.tzid.cmp(&b.tzid));
        Ok(zones)
    }
}
