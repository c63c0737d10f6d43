//! The calendar component cache.
//!
//! [`CalCache`] stores VEVENT, VTODO and VJOURNAL components keyed by UID and
//! RECURRENCE-ID, keeps their derived search columns in step with the stored
//! text, and owns the VTIMEZONE table used to place their times.

mod cancel;
mod extract;
mod identity;
mod search;
mod timezones;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono_tz::Tz;

use calcache_core::config::CacheConfig;
use calcache_rfc::rfc::ical::core::Component;
use calcache_rfc::rfc::ical::expand::{TimeZoneResolver, VTimezone};
use calcache_rfc::rfc::ical::{parse, parse_component, serialize_component};

use crate::db::connection::DbConnection;
use crate::db::enums::{DeletedFlag, OfflineFlag, OfflineState};
use crate::db::query::object::{self, PutObject};
use crate::db::query::timezone;
use crate::db::store::ObjectStore;
use crate::error::{CacheError, CacheResult};
use crate::model::object::{ColumnValues, OfflineChange, StoredObject};

pub use cancel::Cancellable;
pub use extract::{TIME_COLUMN_FORMAT, encode_utc, extract, has_recurrences};
pub use identity::{ComponentId, KEY_DELIMITER, revision};
pub use search::{SearchExpr, SearchRow, TextField};

use cancel::check;
use timezones::{StoreTimezoneSource, ZoneRow};

type TimezoneMap = Mutex<HashMap<String, Arc<VTimezone>>>;

pub struct CalCache {
    store: ObjectStore,
    timezones: TimezoneMap,
    default_tz: Tz,
}

impl std::fmt::Debug for CalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalCache")
            .field("default_tz", &self.default_tz)
            .finish_non_exhaustive()
    }
}

/// One item of [`CalCache::put_components`].
#[derive(Debug, Clone, Copy)]
pub struct ComponentInput<'a> {
    pub component: &'a Component,
    pub extra: Option<&'a str>,
}

impl<'a> From<&'a Component> for ComponentInput<'a> {
    fn from(component: &'a Component) -> Self {
        Self {
            component,
            extra: None,
        }
    }
}

fn parse_stored(key: &str, text: &str) -> CacheResult<Component> {
    parse_component(text).map_err(|e| {
        CacheError::InvalidComponent(format!("stored object {key:?} does not parse: {e}"))
    })
}

impl CalCache {
    /// ## Summary
    /// Opens (creating if needed) the cache file at `path`.
    ///
    /// `default_tz` is used for floating times, DATE values and TZIDs that
    /// neither the timezone table nor the IANA database know.
    ///
    /// ## Errors
    /// Returns `IOFailure` if the file cannot be opened and `SchemaError` if
    /// its schema cannot be brought up to date.
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path, default_tz: Tz) -> CacheResult<Self> {
        Ok(Self::with_store(ObjectStore::open(path)?, default_tz))
    }

    /// ## Summary
    /// Opens the cache described by `config`.
    ///
    /// ## Errors
    /// Returns `CoreError` for an unknown default timezone, otherwise as
    /// [`CalCache::open`].
    pub fn open_with_config(config: &CacheConfig) -> CacheResult<Self> {
        let default_tz = config.default_tz()?;
        Self::open(&config.path, default_tz)
    }

    #[must_use]
    pub fn with_store(store: ObjectStore, default_tz: Tz) -> Self {
        Self {
            store,
            timezones: Mutex::new(HashMap::new()),
            default_tz,
        }
    }

    /// The underlying keyed object store.
    #[must_use]
    pub const fn store(&self) -> &ObjectStore {
        &self.store
    }

    #[must_use]
    pub const fn default_timezone(&self) -> Tz {
        self.default_tz
    }

    /// Parses, indexes and writes one component on an open write transaction.
    fn put_locked(
        &self,
        conn: &mut DbConnection,
        input: ComponentInput<'_>,
        flag: OfflineFlag,
    ) -> CacheResult<OfflineState> {
        let component = input.component;
        if !component.kind.is_schedulable() {
            return Err(CacheError::InvalidComponent(format!(
                "{} cannot be stored as a calendar object",
                component.name
            )));
        }

        let id = ComponentId::from_component(component)?;
        let key = id.storage_key();
        let revision = revision(component);
        let payload = serialize_component(component);

        let columns: ColumnValues = {
            let mut source = StoreTimezoneSource::new(conn, &self.timezones);
            let mut resolver = TimeZoneResolver::with_source(&mut source, self.default_tz);
            extract(component, &mut resolver)
        };

        tracing::debug!(id = %id, revision = %revision, "Storing component");

        object::put(
            conn,
            PutObject {
                key: &key,
                revision: &revision,
                object: &payload,
                extra: input.extra,
            },
            columns,
            flag,
        )
    }

    /// ## Summary
    /// Stores a component, replacing any row with the same UID and
    /// RECURRENCE-ID.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` if the component has no UID or is not an
    /// event, task or journal entry.
    #[tracing::instrument(skip_all, fields(uid = ?component.uid()))]
    pub fn put_component(
        &self,
        component: &Component,
        extra: Option<&str>,
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        self.store.write(|conn| {
            self.put_locked(conn, ComponentInput { component, extra }, flag)
                .map(|_| ())
        })
    }

    /// ## Summary
    /// Parses a single `BEGIN:VEVENT`/`VTODO`/`VJOURNAL` block and stores it.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` if the text does not parse or the component
    /// cannot be stored.
    pub fn put_component_from_str(
        &self,
        text: &str,
        extra: Option<&str>,
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        let component = parse_component(text)
            .map_err(|e| CacheError::InvalidComponent(format!("component does not parse: {e}")))?;
        self.put_component(&component, extra, flag, cancellable)
    }

    /// ## Summary
    /// Stores every component in one transaction.
    ///
    /// Either all components are stored or, on the first failure, none are.
    ///
    /// ## Errors
    /// Returns the first failure; the whole batch is rolled back.
    #[tracing::instrument(skip_all, fields(count = components.len()))]
    pub fn put_components(
        &self,
        components: &[ComponentInput<'_>],
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        self.store.write(|conn| {
            for input in components {
                self.put_locked(conn, *input, flag)?;
            }
            Ok(())
        })?;
        tracing::info!(count = components.len(), "Stored component batch");
        Ok(())
    }

    /// ## Summary
    /// Stores a whole VCALENDAR document in one transaction: first its
    /// VTIMEZONEs, then all of its events, tasks and journal entries.
    ///
    /// Returns the number of components stored. On any error nothing is
    /// stored.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` if the text is not a VCALENDAR or any
    /// component is invalid, and timezone errors as
    /// [`CalCache::put_timezone`].
    pub fn import_calendar(
        &self,
        text: &str,
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<usize> {
        let ical = parse(text)
            .map_err(|e| CacheError::InvalidComponent(format!("calendar does not parse: {e}")))?;

        let zones = ical
            .timezones()
            .map(ZoneRow::validate)
            .collect::<CacheResult<Vec<_>>>()?;
        let inputs: Vec<ComponentInput<'_>> = ical.schedulable().map(ComponentInput::from).collect();

        check(cancellable)?;
        self.store.write(|conn| {
            for zone in &zones {
                zone.write(conn)?;
            }
            for input in &inputs {
                self.put_locked(conn, *input, flag)?;
            }
            Ok(())
        })?;
        tracing::info!(timezones = zones.len(), count = inputs.len(), "Imported calendar");
        Ok(inputs.len())
    }

    /// ## Summary
    /// Removes exactly the row for `uid` and `rid`. Removing a master leaves
    /// its detached instances in place.
    ///
    /// ## Errors
    /// Returns `NotFound` if there is no such row.
    #[tracing::instrument(skip(self, cancellable))]
    pub fn remove_component(
        &self,
        uid: &str,
        rid: Option<&str>,
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        let key = ComponentId::new(uid, rid).storage_key();
        self.store.write(|conn| object::remove(conn, &key, flag))
    }

    /// ## Summary
    /// Removes every listed row in one transaction.
    ///
    /// ## Errors
    /// Returns the first failure; nothing is removed in that case.
    #[tracing::instrument(skip_all, fields(count = ids.len()))]
    pub fn remove_components(
        &self,
        ids: &[ComponentId],
        flag: OfflineFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        self.store.write(|conn| {
            for id in ids {
                object::remove(conn, &id.storage_key(), flag)?;
            }
            Ok(())
        })
    }

    /// ## Summary
    /// Deletes every component and every stored timezone.
    ///
    /// Timezones already parsed into memory stay available.
    ///
    /// ## Errors
    /// Returns database errors if the delete fails.
    pub fn remove_all(&self, cancellable: Option<&Cancellable>) -> CacheResult<()> {
        check(cancellable)?;
        let (objects, zones) = self.store.write(|conn| {
            Ok((object::remove_all(conn)?, timezone::remove_all(conn)?))
        })?;
        tracing::info!(objects, zones, "Cache emptied");
        Ok(())
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such component, or
    /// `InvalidComponent` if its stored text no longer parses.
    pub fn get_component(
        &self,
        uid: &str,
        rid: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Component> {
        check(cancellable)?;
        let key = ComponentId::new(uid, rid).storage_key();
        let row = self.store.get_row(&key, DeletedFlag::Exclude)?;
        parse_stored(&row.uid, &row.object)
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such component.
    pub fn get_component_as_string(
        &self,
        uid: &str,
        rid: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<String> {
        check(cancellable)?;
        self.store
            .get(&ComponentId::new(uid, rid).storage_key(), DeletedFlag::Exclude)
    }

    /// ## Summary
    /// Returns the master for `uid` followed by its detached instances.
    ///
    /// ## Errors
    /// Returns `NotFound` if nothing is stored under `uid`.
    pub fn get_components_by_uid(
        &self,
        uid: &str,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<Component>> {
        self.rows_for_uid(uid, cancellable)?
            .iter()
            .map(|row| parse_stored(&row.uid, &row.object))
            .collect()
    }

    /// ## Errors
    /// Returns `NotFound` if nothing is stored under `uid`.
    pub fn get_components_by_uid_as_strings(
        &self,
        uid: &str,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<String>> {
        Ok(self
            .rows_for_uid(uid, cancellable)?
            .into_iter()
            .map(|row| row.object)
            .collect())
    }

    fn rows_for_uid(
        &self,
        uid: &str,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<StoredObject>> {
        check(cancellable)?;
        let rows = self
            .store
            .read(|conn| object::get_all_for_uid(conn, uid, DeletedFlag::Exclude))?;
        if rows.is_empty() {
            return Err(CacheError::NotFound(format!("no components for UID '{uid}'")));
        }
        Ok(rows)
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such component.
    pub fn get_component_revision(
        &self,
        uid: &str,
        rid: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<String> {
        check(cancellable)?;
        let key = ComponentId::new(uid, rid).storage_key();
        Ok(self.store.get_row(&key, DeletedFlag::Exclude)?.revision)
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn contains_component(
        &self,
        uid: &str,
        rid: Option<&str>,
        deleted: DeletedFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<bool> {
        check(cancellable)?;
        self.store
            .contains(&ComponentId::new(uid, rid).storage_key(), deleted)
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such component.
    pub fn get_component_extra(
        &self,
        uid: &str,
        rid: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Option<String>> {
        check(cancellable)?;
        self.store
            .get_extra(&ComponentId::new(uid, rid).storage_key())
    }

    /// ## Summary
    /// Replaces the caller's side-channel data without touching the
    /// component.
    ///
    /// ## Errors
    /// Returns `NotFound` if there is no such component.
    pub fn set_component_extra(
        &self,
        uid: &str,
        rid: Option<&str>,
        extra: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        self.store
            .set_extra(&ComponentId::new(uid, rid).storage_key(), extra)
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_count(
        &self,
        deleted: DeletedFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<i64> {
        check(cancellable)?;
        self.store.get_count(deleted)
    }

    /// ## Summary
    /// Lists the identity of every stored component, ordered by key.
    ///
    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_uids(
        &self,
        deleted: DeletedFlag,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<ComponentId>> {
        check(cancellable)?;
        Ok(self
            .store
            .get_uids(deleted)?
            .iter()
            .map(|key| ComponentId::from_storage_key(key))
            .collect())
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such row.
    pub fn get_offline_state(
        &self,
        uid: &str,
        rid: Option<&str>,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<OfflineState> {
        check(cancellable)?;
        self.store
            .get_offline_state(&ComponentId::new(uid, rid).storage_key())
    }

    /// ## Errors
    /// Returns `NotFound` if there is no such row.
    pub fn set_offline_state(
        &self,
        uid: &str,
        rid: Option<&str>,
        state: OfflineState,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<()> {
        check(cancellable)?;
        self.store
            .set_offline_state(&ComponentId::new(uid, rid).storage_key(), state)
    }

    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_offline_changes(
        &self,
        cancellable: Option<&Cancellable>,
    ) -> CacheResult<Vec<OfflineChange>> {
        check(cancellable)?;
        self.store.get_offline_changes()
    }

    /// ## Errors
    /// Returns database errors if a write fails.
    pub fn clear_offline_changes(&self, cancellable: Option<&Cancellable>) -> CacheResult<()> {
        check(cancellable)?;
        self.store.clear_offline_changes()
    }

    /// ## Summary
    /// Returns the cache-wide revision, which changes on every write.
    ///
    /// ## Errors
    /// Returns database errors if the query fails.
    pub fn get_revision(&self) -> CacheResult<Option<String>> {
        self.store.get_revision()
    }
}
