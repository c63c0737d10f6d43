use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Location of the SQLite cache file.
    pub path: PathBuf,
    /// IANA zone used when a component references a TZID nothing can resolve.
    pub default_timezone: String,
}

impl CacheConfig {
    /// ## Summary
    /// Resolves `default_timezone` against the IANA database.
    ///
    /// ## Errors
    /// Returns `CoreError::UnknownTimezone` if the name is not a known zone.
    pub fn default_tz(&self) -> CoreResult<chrono_tz::Tz> {
        chrono_tz::Tz::from_str(&self.default_timezone).map_err(|e| CoreError::UnknownTimezone {
            name: self.default_timezone.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from defaults, environment variables and an optional
    /// `config.toml`. Nested keys use a double underscore in the environment,
    /// e.g. `CACHE__DEFAULT_TIMEZONE`.
    ///
    /// ## Errors
    /// Returns an error if building or deserializing the configuration fails,
    /// or if `cache.path` is empty.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("cache.path", "calendar-cache.db")?
            .set_default("cache.default_timezone", "UTC")?
            .set_default("logging.level", "info")?
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?;

        if settings.cache.path.as_os_str().is_empty() {
            return Err(CoreError::ConfigError("cache.path must not be empty".to_string()).into());
        }
        Ok(settings)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::trace!(error = %e, "No .env file loaded");
    }

    Settings::load()
}
