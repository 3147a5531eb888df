//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            device_id TEXT NOT NULL,
            channel TEXT NOT NULL,
            PRIMARY KEY (device_id, channel)
        );

        -- `common`/`native` are NULL when a value was written without an object
        CREATE TABLE IF NOT EXISTS states (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            channel TEXT NOT NULL,
            item TEXT NOT NULL,
            common TEXT,
            native TEXT,
            val INTEGER NOT NULL DEFAULT 0,
            ack INTEGER NOT NULL DEFAULT 1,
            ts TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_states_device ON states(device_id);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}
