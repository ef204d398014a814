//! SQLite persistence adapters

pub mod activity_log;
pub mod directory;
pub mod manager;
mod rows;
pub mod store;

pub use activity_log::SqliteActivityLog;
pub use directory::SqliteContactDirectory;
pub use manager::{DbConnection, DbManager};
pub use store::{SqliteStore, SqliteTx};
