//! Component identity and revision fingerprints.

use calcache_rfc::rfc::ical::core::{Component, Value};

use crate::error::{CacheError, CacheResult};

/// Separates UID and RECURRENCE-ID inside a storage key. Neither may contain
/// a line break, so the master key is a strict prefix of its instance keys.
pub const KEY_DELIMITER: char = '\n';

/// Placeholder for a missing or unusable revision part.
const REVISION_UNSET: &str = "x";

/// Identifies one stored component: a master (`rid` is `None`) or one
/// detached recurrence instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    pub uid: String,
    pub rid: Option<String>,
}

impl ComponentId {
    /// An empty `rid` is treated as absent.
    #[must_use]
    pub fn new(uid: impl Into<String>, rid: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            rid: rid.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }

    /// ## Summary
    /// Reads UID and RECURRENCE-ID from a component.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` if the component has no UID.
    pub fn from_component(component: &Component) -> CacheResult<Self> {
        let uid = component.uid().ok_or_else(|| {
            CacheError::InvalidComponent(format!("{} has no UID", component.name))
        })?;
        Ok(Self::new(uid, component.recurrence_id()))
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        match &self.rid {
            Some(rid) => format!("{}{KEY_DELIMITER}{rid}", self.uid),
            None => self.uid.clone(),
        }
    }

    #[must_use]
    pub fn from_storage_key(key: &str) -> Self {
        match key.split_once(KEY_DELIMITER) {
            Some((uid, rid)) => Self::new(uid, Some(rid)),
            None => Self::new(key, None),
        }
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.rid.is_none()
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rid {
            Some(rid) => write!(f, "{} ({rid})", self.uid),
            None => f.write_str(&self.uid),
        }
    }
}

/// ## Summary
/// Builds the revision fingerprint `DTSTAMP-LASTMODIFIED-SEQUENCE`.
///
/// Times are written as `YYYYMMDDHHMMSS` digits as they appear in the
/// component, without timezone conversion.
#[must_use]
pub fn revision(component: &Component) -> String {
    let stamp = time_digits(component, "DTSTAMP");
    let modified = time_digits(component, "LAST-MODIFIED");
    let sequence = component
        .get_property("SEQUENCE")
        .and_then(|p| match &p.value {
            Value::Integer(n) => Some(*n),
            _ => p.raw_value.trim().parse().ok(),
        })
        .map_or_else(|| REVISION_UNSET.to_string(), |n| n.to_string());

    format!("{stamp}-{modified}-{sequence}")
}

fn time_digits(component: &Component, name: &str) -> String {
    component
        .get_property(name)
        .and_then(|p| p.as_datetime())
        .filter(|dt| dt.to_naive().is_some())
        .map_or_else(
            || REVISION_UNSET.to_string(),
            |dt| {
                format!(
                    "{:04}{:02}{:02}{:02}{:02}{:02}",
                    dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
                )
            },
        )
}
