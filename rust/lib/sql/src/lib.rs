pub mod config;
pub mod sqlite;

pub use config::{DEFAULT_TABLE_PREFIX, SqlConfig};
pub use sqlite::SqliteStore;
