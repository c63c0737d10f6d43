pub mod cache;
pub mod db;
pub mod error;
pub mod model;

pub use cache::{
    CalCache, Cancellable, ComponentId, ComponentInput, SearchExpr, SearchRow, TextField,
};
pub use db::enums::{DeletedFlag, OfflineFlag, OfflineState};
pub use db::query::text_match::MatchType;
pub use error::{CacheError, CacheResult};
