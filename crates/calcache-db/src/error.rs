use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Calendar cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Storage failure: {0}")]
    IOFailure(String),

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Timezone has no TZID")]
    MissingIdentifier,

    #[error("Timezone '{0}' has no usable definition")]
    MissingDefinition(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    CoreError(#[from] calcache_core::error::CoreError),
}

impl From<DieselError> for CacheError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound(err.to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                Self::TransactionConflict(info.message().to_string())
            }
            DieselError::DatabaseError(_, ref info) if is_busy_message(info.message()) => {
                Self::TransactionConflict(info.message().to_string())
            }
            other => Self::IOFailure(other.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for CacheError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::IOFailure(err.to_string())
    }
}

/// `SQLITE_BUSY` and `SQLITE_LOCKED` reach diesel as their message text only.
fn is_busy_message(message: &str) -> bool {
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
