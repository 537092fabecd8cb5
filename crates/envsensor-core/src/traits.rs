//! Collaborator seams of the sync engines.
//!
//! [`Transport`] abstracts the connected GATT channel so the page handshake
//! runs the same against a real sensor ([`crate::BleTransport`]) and a
//! simulated ring ([`crate::mock::MockTransport`]). [`LogStore`] and [`Sink`]
//! decouple the engines from SQLite and InfluxDB.

use async_trait::async_trait;
use uuid::Uuid;

use envsensor_types::LogRow;

use crate::error::Result;
use crate::models::{
    AppendOutcome, AppendSummary, DeviceRecord, ForwardCheckpoint, Point, StoredRow,
    SyncCheckpoint,
};

/// A characteristic read/write channel to one sensor.
///
/// Implementations must fail with a transport error (not hang) once the
/// link drops; callers treat that as fatal for the current device only.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Device address or identifier.
    fn address(&self) -> &str;

    /// Connect to the device. A no-op when already connected.
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;
}

/// Durable row store for sensor logs and checkpoints.
///
/// Rows are write-once: appending a row whose identity is already stored is
/// a no-op reported as [`AppendOutcome::Duplicate`] (same payload) or
/// [`AppendOutcome::Conflict`] (different payload, stored row untouched).
pub trait LogStore {
    /// Create or refresh the device record.
    fn record_device(
        &mut self,
        address: &str,
        label: Option<&str>,
        clock_offset: Option<i64>,
    ) -> Result<DeviceRecord>;

    /// Append one row, stamping it with `device_time + clock_offset`.
    fn append(&mut self, device: &str, row: &LogRow, clock_offset: i64) -> Result<AppendOutcome>;

    /// Append a page worth of rows.
    fn append_page(
        &mut self,
        device: &str,
        rows: &[LogRow],
        clock_offset: i64,
    ) -> Result<AppendSummary> {
        let mut summary = AppendSummary::default();
        for row in rows {
            summary.record(self.append(device, row, clock_offset)?);
        }
        Ok(summary)
    }

    fn get_checkpoint(&self, device: &str) -> Result<Option<SyncCheckpoint>>;

    /// Replace the device's checkpoint in one atomic update.
    fn set_checkpoint(&mut self, device: &str, checkpoint: &SyncCheckpoint) -> Result<()>;

    /// Up to `limit` rows with id greater than `cursor`, ascending by id.
    fn rows_after(&self, cursor: i64, limit: usize) -> Result<Vec<StoredRow>>;

    fn forward_checkpoint(&self) -> Result<Option<ForwardCheckpoint>>;

    fn set_forward_checkpoint(&mut self, checkpoint: &ForwardCheckpoint) -> Result<()>;
}

/// Outbound time-series sink.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write one batch. `Ok` means every point is durably accepted.
    async fn write_batch(&self, points: &[Point]) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn address(&self) -> &str {
        (**self).address()
    }

    async fn connect(&self) -> Result<()> {
        (**self).connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        (**self).read(characteristic).await
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        (**self).write(characteristic, data).await
    }
}
