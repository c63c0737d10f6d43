pub mod connection;
pub mod enums;
pub mod migrate;
pub mod query;
pub mod schema;
pub mod store;
pub mod transaction;
