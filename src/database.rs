//! Shared SQLite connection handling
//!
//! Opens the database file and creates the schema idempotently. All SQLite
//! stores share one connection behind a mutex, so every multi-statement
//! operation runs on a consistent view.

use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Open (or create) the database at the given path and ensure the schema.
pub fn open(db_path: &str) -> Result<Arc<Mutex<Connection>>, rusqlite::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    info!("Opening database at {}", db_path);
    let conn = Connection::open(db_path)?;
    create_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database, used by tests.
pub fn open_in_memory() -> Result<Arc<Mutex<Connection>>, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn create_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS key_value_data (
            category TEXT NOT NULL,
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            display_category TEXT NOT NULL,
            display_collection TEXT NOT NULL,
            display_key TEXT NOT NULL,
            metadata TEXT NOT NULL,
            keywords TEXT,
            PRIMARY KEY (category, collection, key)
        );
        CREATE TABLE IF NOT EXISTS locales (
            id TEXT NOT NULL PRIMARY KEY,
            is_default INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS localized_values (
            locale TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (locale, key)
        );
        CREATE TABLE IF NOT EXISTS audit_trail (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            user_name TEXT NOT NULL,
            event_type TEXT NOT NULL,
            data_type TEXT NOT NULL,
            data_reference TEXT NOT NULL,
            data_diff TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS ix_audit_trail_timestamp ON audit_trail (timestamp);",
    )
}
