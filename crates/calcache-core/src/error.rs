use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A zone name that is not in the IANA database.
    #[error("Unknown timezone '{name}': {reason}")]
    UnknownTimezone { name: String, reason: String },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
