//! chat2anyllm store: SQLite rows for sessions, messages and role presets.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
