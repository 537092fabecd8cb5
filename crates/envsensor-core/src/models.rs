//! Records exchanged between the sync engines and their collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use envsensor_types::{LogRow, Measurement};

/// A known sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub address: String,
    pub label: Option<String>,
    /// Host clock minus device clock in seconds, as last observed.
    pub clock_offset: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_sync: OffsetDateTime,
}

/// How far a device's ring has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Last consumed ring position.
    pub page: u16,
    /// Last consumed row of that page. Below 12 means the page was still
    /// being written when it was read.
    pub row: u8,
    /// Device-clock start time of the last consumed page.
    pub timestamp: u32,
    /// Set after the device's ring was restarted (interval change); the next
    /// scan starts at page 0.
    pub ring_reset: bool,
    /// The device's recording start when this checkpoint was written. A
    /// different value later means the ring was restarted in between.
    #[serde(default)]
    pub recording_start: Option<u32>,
}

impl SyncCheckpoint {
    /// Whether the checkpointed page had unread row slots left.
    pub fn is_partial(&self) -> bool {
        self.row < envsensor_types::ring::LAST_ROW
    }

    /// A checkpoint that forces the next scan to restart at page 0.
    pub fn after_ring_reset(start_time: u32, recording_start: Option<u32>) -> Self {
        Self {
            page: 0,
            row: 0,
            timestamp: start_time,
            ring_reset: true,
            recording_start,
        }
    }
}

/// Result of appending one row to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// Already stored with the same payload.
    Duplicate,
    /// Already stored with a different payload; the stored row is kept.
    Conflict,
}

/// Counts for a batch of appends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendSummary {
    pub inserted: usize,
    pub duplicate: usize,
    pub conflict: usize,
}

impl AppendSummary {
    pub fn record(&mut self, outcome: AppendOutcome) {
        match outcome {
            AppendOutcome::Inserted => self.inserted += 1,
            AppendOutcome::Duplicate => self.duplicate += 1,
            AppendOutcome::Conflict => self.conflict += 1,
        }
    }

    pub fn merge(&mut self, other: AppendSummary) {
        self.inserted += other.inserted;
        self.duplicate += other.duplicate;
        self.conflict += other.conflict;
    }
}

/// A persisted log row, as read back for forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Monotonic store-assigned identifier.
    pub id: i64,
    pub device: String,
    pub page: u16,
    pub row: u8,
    pub device_time: u32,
    /// Host-clock sample time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub measurement: Measurement,
}

impl StoredRow {
    pub fn log_row(&self) -> LogRow {
        LogRow {
            page: self.page,
            row: self.row,
            device_time: self.device_time,
            measurement: self.measurement,
        }
    }
}

/// Cursor of the outbound sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardCheckpoint {
    /// Highest row id acknowledged by the sink.
    pub last_row_id: i64,
    /// Sample time of that row.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One time-series point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// Measurement name used for forwarded rows.
pub const POINT_MEASUREMENT: &str = "env_sensor";

impl Point {
    /// Build the point for a stored row, tagged with its BLE address.
    pub fn from_row(row: &StoredRow) -> Self {
        let m = &row.measurement;
        let mut fields = BTreeMap::new();
        for (name, value) in [
            ("temperature", m.temperature),
            ("humidity", m.humidity),
            ("uv_index", m.uv_index),
            ("pressure", m.pressure),
            ("noise", m.noise),
            ("discomfort_index", m.discomfort_index),
            ("heat_stroke", m.heat_stroke),
            ("battery_voltage", m.battery_voltage),
        ] {
            fields.insert(name.to_string(), FieldValue::Float(rounded(value)));
        }
        fields.insert("light".to_string(), FieldValue::Integer(i64::from(m.light)));
        fields.insert("page".to_string(), FieldValue::Integer(i64::from(row.page)));
        fields.insert("row".to_string(), FieldValue::Integer(i64::from(row.row)));

        let mut tags = BTreeMap::new();
        tags.insert("ble_address".to_string(), row.device.clone());

        Point {
            measurement: POINT_MEASUREMENT.to_string(),
            tags,
            fields,
            time: row.timestamp,
        }
    }
}

// f32 -> f64 widening exposes binary noise (25.89 -> 25.889999...).
fn rounded(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}
