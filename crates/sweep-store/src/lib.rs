//! SQLite persistence of completed run summaries.
mod sqlite;
pub use sqlite::SqliteResultStore;
