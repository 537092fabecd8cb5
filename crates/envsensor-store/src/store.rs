//! SQLite implementation of [`LogStore`].

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use envsensor_core::{
    AppendOutcome, AppendSummary, DeviceRecord, ForwardCheckpoint, LogStore, StoredRow,
    SyncCheckpoint,
};
use envsensor_types::{LogRow, Measurement};

use crate::error::{Error, Result};
use crate::queries::RowQuery;
use crate::schema;

const ROW_COLUMNS: &str = "id, device_id, page, row, device_time, timestamp, temperature, \
     humidity, light, uv_index, pressure, noise, discomfort_index, heat_stroke, battery_voltage";

/// SQLite-based store for sensor log rows and sync checkpoints.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // === Device operations ===

    /// Create or refresh a device entry. `None` arguments keep stored values.
    pub fn upsert_device(
        &self,
        address: &str,
        label: Option<&str>,
        clock_offset: Option<i64>,
    ) -> Result<DeviceRecord> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        self.conn.execute(
            "INSERT INTO devices (address, label, clock_offset, first_seen, last_sync)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(address) DO UPDATE SET
                label = COALESCE(?2, label),
                clock_offset = COALESCE(?3, clock_offset),
                last_sync = ?4",
            params![address, label, clock_offset, now],
        )?;

        self.get_device(address)?
            .ok_or_else(|| Error::DeviceNotFound(address.to_string()))
    }

    pub fn get_device(&self, address: &str) -> Result<Option<DeviceRecord>> {
        let raw = self
            .conn
            .query_row(
                "SELECT address, label, clock_offset, first_seen, last_sync
                 FROM devices WHERE address = ?",
                [address],
                RawDevice::read,
            )
            .optional()?;

        raw.map(RawDevice::into_record).transpose()
    }

    /// All known devices, ordered by address.
    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT address, label, clock_offset, first_seen, last_sync
             FROM devices ORDER BY address",
        )?;

        let raw = stmt
            .query_map([], RawDevice::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter().map(RawDevice::into_record).collect()
    }

    // === Row operations ===

    /// Number of stored rows, for one device or all of them.
    pub fn row_count(&self, device: Option<&str>) -> Result<u64> {
        let count: i64 = match device {
            Some(address) => self.conn.query_row(
                "SELECT COUNT(*) FROM log_rows WHERE device_id = ?",
                [address],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM log_rows", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }

    /// Query stored rows with filters.
    pub fn query_rows(&self, query: &RowQuery) -> Result<Vec<StoredRow>> {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device) = query.device {
            conditions.push("device_id = ?");
            params.push(Box::new(device.clone()));
        }

        if let Some(since) = query.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since.unix_timestamp()));
        }

        if let Some(until) = query.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until.unix_timestamp()));
        }

        if let Some(page) = query.page {
            conditions.push("page = ?");
            params.push(Box::new(page));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order = if query.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT {ROW_COLUMNS} FROM log_rows {where_clause} \
             ORDER BY timestamp {order}, id {order}"
        );

        // SQLite only accepts OFFSET after a LIMIT.
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params_ref.as_slice(), RawRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter().map(RawRow::into_stored).collect()
    }

    // === Checkpoints ===

    pub fn checkpoint(&self, device: &str) -> Result<Option<SyncCheckpoint>> {
        let raw = self
            .conn
            .query_row(
                "SELECT page, row, timestamp, ring_reset, recording_start
                 FROM sync_checkpoints WHERE device_id = ?",
                [device],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        raw.map(|(page, row, timestamp, ring_reset, recording_start)| {
            Ok(SyncCheckpoint {
                page: narrow("sync_checkpoints.page", page)?,
                row: narrow("sync_checkpoints.row", row)?,
                timestamp: narrow("sync_checkpoints.timestamp", timestamp)?,
                ring_reset,
                recording_start: recording_start
                    .map(|t| narrow("sync_checkpoints.recording_start", t))
                    .transpose()?,
            })
        })
        .transpose()
    }

    fn write_checkpoint(&self, device: &str, checkpoint: &SyncCheckpoint) -> Result<()> {
        ensure_device(&self.conn, device)?;
        self.conn.execute(
            "INSERT INTO sync_checkpoints
                (device_id, page, row, timestamp, ring_reset, recording_start, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(device_id) DO UPDATE SET
                page = ?2, row = ?3, timestamp = ?4, ring_reset = ?5,
                recording_start = ?6, updated_at = ?7",
            params![
                device,
                checkpoint.page,
                checkpoint.row,
                checkpoint.timestamp,
                checkpoint.ring_reset,
                checkpoint.recording_start,
                OffsetDateTime::now_utc().unix_timestamp()
            ],
        )?;
        debug!(
            "Checkpoint for {} set to page {} row {}",
            device, checkpoint.page, checkpoint.row
        );
        Ok(())
    }

    pub fn forward_cursor(&self) -> Result<Option<ForwardCheckpoint>> {
        let raw = self
            .conn
            .query_row(
                "SELECT last_row_id, timestamp FROM forward_checkpoint WHERE id = 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        raw.map(|(last_row_id, timestamp)| {
            Ok(ForwardCheckpoint {
                last_row_id,
                timestamp: to_datetime(timestamp)?,
            })
        })
        .transpose()
    }

    fn write_forward_cursor(&self, checkpoint: &ForwardCheckpoint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO forward_checkpoint (id, last_row_id, timestamp, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                last_row_id = ?1, timestamp = ?2, updated_at = ?3",
            params![
                checkpoint.last_row_id,
                checkpoint.timestamp.unix_timestamp(),
                OffsetDateTime::now_utc().unix_timestamp()
            ],
        )?;
        Ok(())
    }

    fn rows_after_id(&self, cursor: i64, limit: usize) -> Result<Vec<StoredRow>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROW_COLUMNS} FROM log_rows WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;
        let raw = stmt
            .query_map(params![cursor, limit], RawRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter().map(RawRow::into_stored).collect()
    }
}

impl LogStore for Store {
    fn record_device(
        &mut self,
        address: &str,
        label: Option<&str>,
        clock_offset: Option<i64>,
    ) -> envsensor_core::Result<DeviceRecord> {
        Ok(self.upsert_device(address, label, clock_offset)?)
    }

    fn append(
        &mut self,
        device: &str,
        row: &LogRow,
        clock_offset: i64,
    ) -> envsensor_core::Result<AppendOutcome> {
        ensure_device(&self.conn, device)?;
        let synced_at = OffsetDateTime::now_utc().unix_timestamp();
        Ok(append_row(&self.conn, device, row, clock_offset, synced_at)?)
    }

    /// All rows of the page commit together.
    fn append_page(
        &mut self,
        device: &str,
        rows: &[LogRow],
        clock_offset: i64,
    ) -> envsensor_core::Result<AppendSummary> {
        let synced_at = OffsetDateTime::now_utc().unix_timestamp();
        let tx = self.conn.transaction().map_err(Error::from)?;
        ensure_device(&tx, device)?;
        let mut summary = AppendSummary::default();
        for row in rows {
            summary.record(append_row(&tx, device, row, clock_offset, synced_at)?);
        }
        tx.commit().map_err(Error::from)?;
        Ok(summary)
    }

    fn get_checkpoint(&self, device: &str) -> envsensor_core::Result<Option<SyncCheckpoint>> {
        Ok(self.checkpoint(device)?)
    }

    fn set_checkpoint(
        &mut self,
        device: &str,
        checkpoint: &SyncCheckpoint,
    ) -> envsensor_core::Result<()> {
        Ok(self.write_checkpoint(device, checkpoint)?)
    }

    fn rows_after(&self, cursor: i64, limit: usize) -> envsensor_core::Result<Vec<StoredRow>> {
        Ok(self.rows_after_id(cursor, limit)?)
    }

    fn forward_checkpoint(&self) -> envsensor_core::Result<Option<ForwardCheckpoint>> {
        Ok(self.forward_cursor()?)
    }

    fn set_forward_checkpoint(
        &mut self,
        checkpoint: &ForwardCheckpoint,
    ) -> envsensor_core::Result<()> {
        Ok(self.write_forward_cursor(checkpoint)?)
    }
}

/// Insert a device row with no label or offset if it is not known yet.
fn ensure_device(conn: &Connection, address: &str) -> Result<()> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT OR IGNORE INTO devices (address, first_seen, last_sync) VALUES (?1, ?2, ?2)",
        params![address, now],
    )?;
    Ok(())
}

fn append_row(
    conn: &Connection,
    device: &str,
    row: &LogRow,
    clock_offset: i64,
    synced_at: i64,
) -> Result<AppendOutcome> {
    let existing = conn
        .query_row(
            "SELECT temperature, humidity, light, uv_index, pressure, noise,
                    discomfort_index, heat_stroke, battery_voltage
             FROM log_rows WHERE device_id = ?1 AND page = ?2 AND row = ?3 AND device_time = ?4",
            params![device, row.page, row.row, row.device_time],
            |r| read_measurement(r, 0),
        )
        .optional()?;

    if let Some(stored) = existing {
        let stored = stored.into_measurement()?;
        if stored == row.measurement {
            return Ok(AppendOutcome::Duplicate);
        }
        warn!(
            "Row {}/{} at {} of {} differs from the stored row; keeping the stored one",
            row.page, row.row, row.device_time, device
        );
        return Ok(AppendOutcome::Conflict);
    }

    let timestamp = row
        .timestamp(clock_offset)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
    let m = &row.measurement;
    conn.execute(
        "INSERT INTO log_rows (device_id, page, row, device_time, timestamp, synced_at,
            temperature, humidity, light, uv_index, pressure, noise,
            discomfort_index, heat_stroke, battery_voltage)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            device,
            row.page,
            row.row,
            row.device_time,
            timestamp.unix_timestamp(),
            synced_at,
            f64::from(m.temperature),
            f64::from(m.humidity),
            m.light,
            f64::from(m.uv_index),
            f64::from(m.pressure),
            f64::from(m.noise),
            f64::from(m.discomfort_index),
            f64::from(m.heat_stroke),
            f64::from(m.battery_voltage),
        ],
    )?;
    Ok(AppendOutcome::Inserted)
}

fn narrow<T: TryFrom<i64>>(column: &'static str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::InvalidValue { column, value })
}

fn to_datetime(secs: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

struct RawDevice {
    address: String,
    label: Option<String>,
    clock_offset: Option<i64>,
    first_seen: i64,
    last_sync: i64,
}

impl RawDevice {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            address: row.get(0)?,
            label: row.get(1)?,
            clock_offset: row.get(2)?,
            first_seen: row.get(3)?,
            last_sync: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<DeviceRecord> {
        Ok(DeviceRecord {
            address: self.address,
            label: self.label,
            clock_offset: self.clock_offset,
            first_seen: to_datetime(self.first_seen)?,
            last_sync: to_datetime(self.last_sync)?,
        })
    }
}

/// Measurement columns as SQLite returns them.
struct RawMeasurement {
    values: [f64; 8],
    light: i64,
}

fn read_measurement(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<RawMeasurement> {
    Ok(RawMeasurement {
        values: [
            row.get(first)?,
            row.get(first + 1)?,
            row.get(first + 3)?,
            row.get(first + 4)?,
            row.get(first + 5)?,
            row.get(first + 6)?,
            row.get(first + 7)?,
            row.get(first + 8)?,
        ],
        light: row.get(first + 2)?,
    })
}

impl RawMeasurement {
    fn into_measurement(self) -> Result<Measurement> {
        let [
            temperature,
            humidity,
            uv_index,
            pressure,
            noise,
            discomfort_index,
            heat_stroke,
            battery_voltage,
        ] = self.values;
        Ok(Measurement {
            temperature: temperature as f32,
            humidity: humidity as f32,
            light: narrow("log_rows.light", self.light)?,
            uv_index: uv_index as f32,
            pressure: pressure as f32,
            noise: noise as f32,
            discomfort_index: discomfort_index as f32,
            heat_stroke: heat_stroke as f32,
            battery_voltage: battery_voltage as f32,
        })
    }
}

struct RawRow {
    id: i64,
    device: String,
    page: i64,
    row: i64,
    device_time: i64,
    timestamp: i64,
    measurement: RawMeasurement,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            device: row.get(1)?,
            page: row.get(2)?,
            row: row.get(3)?,
            device_time: row.get(4)?,
            timestamp: row.get(5)?,
            measurement: read_measurement(row, 6)?,
        })
    }

    fn into_stored(self) -> Result<StoredRow> {
        Ok(StoredRow {
            id: self.id,
            device: self.device,
            page: narrow("log_rows.page", self.page)?,
            row: narrow("log_rows.row", self.row)?,
            device_time: narrow("log_rows.device_time", self.device_time)?,
            timestamp: to_datetime(self.timestamp)?,
            measurement: self.measurement.into_measurement()?,
        })
    }
}
