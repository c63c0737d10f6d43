//! Subcommand bodies. Each prints its result to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use calcache_db::{CalCache, OfflineFlag};

const TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// ## Summary
/// Parses `YYYYMMDDTHHMMSSZ`, or `YYYY-MM-DD` as midnight UTC.
///
/// ## Errors
/// Returns an error if `text` is in neither form.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = NaiveDateTime::parse_from_str(text, TIME_FORMAT) {
        return Ok(time.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    bail!("'{text}' is not a UTC time like 20240109T090000Z or a date like 2024-01-09")
}

/// ## Errors
/// Returns an error if a file cannot be read or stored.
pub fn import(cache: &CalCache, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        bail!("no files given");
    }

    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let count = cache
            .import_calendar(&text, OfflineFlag::Online, None)
            .with_context(|| format!("importing {}", file.display()))?;
        tracing::info!(file = %file.display(), count, "Imported calendar");
        println!("{}: {count} components", file.display());
    }
    Ok(())
}

/// ## Errors
/// Returns an error if a bound does not parse or the query fails.
pub fn range(cache: &CalCache, start: &str, end: &str) -> Result<()> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    if end <= start {
        bail!("range end must be after its start");
    }

    let components = cache
        .get_components_in_range(start, end, None)
        .context("querying range")?;
    for component in &components {
        println!(
            "{}\t{}\t{}",
            component.uid().unwrap_or_default(),
            component.recurrence_id().unwrap_or("-"),
            component.summary().unwrap_or_default(),
        );
    }
    tracing::debug!(count = components.len(), %start, %end, "Range listed");
    Ok(())
}

/// ## Errors
/// Returns an error if nothing is stored under `uid` and `rid`.
pub fn get(cache: &CalCache, uid: &str, rid: Option<&str>) -> Result<()> {
    if rid.is_some() {
        print!("{}", cache.get_component_as_string(uid, rid, None)?);
        return Ok(());
    }
    for text in cache.get_components_by_uid_as_strings(uid, None)? {
        print!("{text}");
    }
    Ok(())
}

/// ## Errors
/// Returns an error if the timezone table cannot be read.
pub fn timezones(cache: &CalCache) -> Result<()> {
    for zone in cache.list_timezones(None)? {
        println!("{}", zone.tzid);
    }
    Ok(())
}

/// ## Errors
/// Returns an error if there is no such component.
pub fn remove(cache: &CalCache, uid: &str, rid: Option<&str>) -> Result<()> {
    cache
        .remove_component(uid, rid, OfflineFlag::Online, None)
        .with_context(|| format!("removing {uid}"))?;
    tracing::info!(uid, ?rid, "Removed component");
    Ok(())
}
