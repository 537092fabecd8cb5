//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        migrate_to_v2(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS devices (
            address TEXT PRIMARY KEY,
            label TEXT,
            clock_offset INTEGER,
            first_seen INTEGER NOT NULL,
            last_sync INTEGER NOT NULL
        );

        -- One row per logged sample. Ring slots repeat every revolution, so
        -- the device time is part of the identity.
        CREATE TABLE IF NOT EXISTS log_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL REFERENCES devices(address),
            page INTEGER NOT NULL,
            row INTEGER NOT NULL,
            device_time INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            synced_at INTEGER NOT NULL,
            temperature REAL NOT NULL,
            humidity REAL NOT NULL,
            light INTEGER NOT NULL,
            uv_index REAL NOT NULL,
            pressure REAL NOT NULL,
            noise REAL NOT NULL,
            discomfort_index REAL NOT NULL,
            heat_stroke REAL NOT NULL,
            battery_voltage REAL NOT NULL,
            UNIQUE(device_id, page, row, device_time)
        );
        CREATE INDEX IF NOT EXISTS idx_log_rows_device_time
            ON log_rows(device_id, timestamp);

        CREATE TABLE IF NOT EXISTS sync_checkpoints (
            device_id TEXT PRIMARY KEY REFERENCES devices(address),
            page INTEGER NOT NULL,
            row INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            ring_reset INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS forward_checkpoint (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_row_id INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    if old_version < 2 {
        migrate_to_v2(conn)?;
    }
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// v2: the device's recording start is kept with each checkpoint.
fn migrate_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch("ALTER TABLE sync_checkpoints ADD COLUMN recording_start INTEGER;")?;
    Ok(())
}
