//! In-memory collaborators for testing without hardware.
//!
//! - [`MockTransport`] simulates an EnvSensor: a 2048-page ring that keeps
//!   recording, the page request handshake, a fixed recording start that
//!   only changes when recording restarts, and failure injection.
//! - [`MemoryStore`] is a [`LogStore`] with the same write-once semantics as
//!   the SQLite store.
//! - [`MemorySink`] records batches and can be told to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use envsensor_types::ring::{self, LAST_ROW, RING_SIZE, ROWS_PER_PAGE};
use envsensor_types::uuid::{
    DEVICE_NAME, ERROR_STATUS, LATEST_DATA, LATEST_PAGE, MEASUREMENT_INTERVAL, REQUEST_PAGE,
    RESPONSE_DATA, RESPONSE_FLAG, SUPPORTED_DEVICE_NAME, TIME_INFORMATION,
};
use envsensor_types::{
    ErrorStatus, LatestPage, LogRow, Measurement, MeasurementInterval, RequestPage, ResponseData,
    ResponseFlag, TimeInformation,
};

use crate::error::{Error, Result};
use crate::models::{
    AppendOutcome, DeviceRecord, ForwardCheckpoint, Point, StoredRow, SyncCheckpoint,
};
use crate::traits::{LogStore, Sink, Transport};

/// Flag value the simulated device returns for pages it cannot serve.
pub const MOCK_REJECT_FLAG: u8 = 0x02;

#[derive(Debug, Clone)]
struct MockPage {
    start_time: u32,
    rows: Vec<ResponseData>,
}

#[derive(Debug)]
struct PendingRequest {
    request: RequestPage,
    polls_left: u32,
    next_row: Option<u8>,
}

#[derive(Debug)]
struct RingState {
    name: String,
    interval: u16,
    /// Device clock minus host clock.
    clock_skew: i64,
    /// What TimeInformation reads back: when recording last restarted.
    recording_start: u32,
    pages: HashMap<u16, MockPage>,
    latest_page: u16,
    sequence: u64,
    pending: Option<PendingRequest>,
    polls_until_ready: u32,
    rejected: HashMap<u16, u8>,
    corrupted: HashSet<u16>,
    error_status: ErrorStatus,
    time_writes: Vec<u32>,
    interval_writes: Vec<u16>,
}

impl RingState {
    fn span(&self) -> u32 {
        u32::from(self.interval) * u32::from(ROWS_PER_PAGE)
    }

    fn device_now(&self) -> u32 {
        let now = OffsetDateTime::now_utc().unix_timestamp() + self.clock_skew;
        u32::try_from(now).unwrap_or(0)
    }

    fn latest(&self) -> LatestPage {
        let page = self.pages.get(&self.latest_page);
        LatestPage {
            start_time: page.map(|p| p.start_time).unwrap_or(0),
            interval: self.interval,
            page: self.latest_page,
            row: page
                .and_then(|p| p.rows.last())
                .map(|r| r.row)
                .unwrap_or(0),
        }
    }

    fn sample(&mut self, row: u8) -> ResponseData {
        let seq = self.sequence;
        self.sequence += 1;
        ResponseData {
            row,
            measurement: Measurement {
                temperature: 20.0 + (seq % 100) as f32 / 10.0,
                humidity: 40.0 + (seq % 50) as f32 / 2.0,
                light: (seq % 1000) as u16,
                uv_index: 0.02,
                pressure: 1000.0 + (seq % 30) as f32,
                noise: 35.5,
                discomfort_index: 70.25,
                heat_stroke: 22.5,
                battery_voltage: 2.9,
            },
        }
    }

    /// Start a new page at `page` holding rows 0..=`last_row`.
    fn write_page(&mut self, page: u16, start_time: u32, last_row: u8) {
        let rows = (0..=last_row).map(|r| self.sample(r)).collect();
        self.pages.insert(page, MockPage { start_time, rows });
        self.latest_page = page;
    }

    fn fill_latest(&mut self) {
        let latest = self.latest_page;
        let have = self
            .pages
            .get(&latest)
            .map(|p| p.rows.len() as u8)
            .unwrap_or(0);
        let extra: Vec<ResponseData> = (have..=LAST_ROW).map(|r| self.sample(r)).collect();
        if let Some(page) = self.pages.get_mut(&latest) {
            page.rows.extend(extra);
        }
    }

    /// Record `pages` more pages; the newest holds rows 0..=`row`.
    fn advance(&mut self, pages: u32, row: u8) {
        if pages == 0 {
            let have = self
                .pages
                .get(&self.latest_page)
                .map(|p| p.rows.len() as u8)
                .unwrap_or(0);
            let extra: Vec<ResponseData> = (have..=row).map(|r| self.sample(r)).collect();
            let latest = self.latest_page;
            if let Some(page) = self.pages.get_mut(&latest) {
                page.rows.extend(extra);
            }
            self.keep_clock_ahead();
            return;
        }
        self.fill_latest();
        let mut start = self.latest().start_time;
        for i in 0..pages {
            start += self.span();
            let page = ring::next_page(self.latest_page);
            let last = if i + 1 == pages { row } else { LAST_ROW };
            self.write_page(page, start, last);
        }
        self.keep_clock_ahead();
    }

    /// The device cannot have sampled in its own future: simulated
    /// recording moves the device clock along with it.
    fn keep_clock_ahead(&mut self) {
        let latest = self.latest();
        let sample =
            i64::from(latest.start_time) + i64::from(latest.interval) * i64::from(latest.row);
        let host_now = OffsetDateTime::now_utc().unix_timestamp();
        if sample > host_now + self.clock_skew {
            self.clock_skew = sample - host_now;
        }
    }

    /// Drop the log and start again at page 0, row 0.
    fn restart_recording(&mut self, at: u32) {
        self.pages.clear();
        self.recording_start = at;
        self.write_page(0, at, 0);
    }
}

/// Simulated EnvSensor.
///
/// ```
/// use envsensor_core::mock::MockTransport;
/// use envsensor_core::Transport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let device = MockTransport::builder().pages(16).latest_row(12).build();
/// device.connect().await.unwrap();
/// assert_eq!(device.latest_page().await.page, 15);
/// # }
/// ```
pub struct MockTransport {
    address: String,
    connected: AtomicBool,
    state: RwLock<RingState>,
    request_count: AtomicU32,
    /// Fail every page request after this many succeeded (0 = never).
    fail_after_requests: AtomicU32,
    /// Drop the link once when this many requests have succeeded (0 = never).
    drop_link_at: AtomicU32,
    connect_failures: AtomicU32,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Simulate the device recording for a while.
    pub async fn advance(&self, pages: u32, row: u8) {
        self.state.write().await.advance(pages, row);
    }

    pub async fn latest_page(&self) -> LatestPage {
        self.state.read().await.latest()
    }

    /// Answer requests for `page` with failure flag `flag`.
    pub async fn reject_page(&self, page: u16, flag: u8) {
        self.state.write().await.rejected.insert(page, flag);
    }

    /// Serve a truncated ResponseData payload for `page`.
    pub async fn corrupt_page(&self, page: u16) {
        self.state.write().await.corrupted.insert(page);
    }

    pub async fn set_error_status(&self, status: ErrorStatus) {
        self.state.write().await.error_status = status;
    }

    pub async fn set_name(&self, name: &str) {
        self.state.write().await.name = name.to_string();
    }

    /// Offset the device clock from the host clock.
    pub async fn set_clock_skew(&self, secs: i64) {
        self.state.write().await.clock_skew = secs;
    }

    /// The TimeInformation value: when the current recording started.
    pub async fn recording_start(&self) -> u32 {
        self.state.read().await.recording_start
    }

    /// Drop the link on every page request after `count` more succeed.
    pub fn disconnect_after_requests(&self, count: u32) {
        let done = self.request_count.load(Ordering::SeqCst);
        self.fail_after_requests.store(done + count, Ordering::SeqCst);
    }

    /// Drop the link once, on the first page request after `count` more
    /// succeed. Requests work again after a reconnect.
    pub fn drop_link_after_requests(&self, count: u32) {
        let done = self.request_count.load(Ordering::SeqCst);
        self.drop_link_at.store(done + count + 1, Ordering::SeqCst);
    }

    /// Clear injected request failures.
    pub fn heal(&self) {
        self.fail_after_requests.store(0, Ordering::SeqCst);
    }

    pub fn fail_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Page requests written so far.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub async fn time_writes(&self) -> Vec<u32> {
        self.state.read().await.time_writes.clone()
    }

    pub async fn interval_writes(&self) -> Vec<u16> {
        self.state.read().await.interval_writes.clone()
    }

    /// Rows currently held for `page`, ascending.
    pub async fn page_rows(&self, page: u16) -> Vec<ResponseData> {
        self.state
            .read()
            .await
            .pages
            .get(&page)
            .map(|p| p.rows.clone())
            .unwrap_or_default()
    }

    fn handle_request(&self, state: &mut RingState, data: &[u8]) -> Result<()> {
        let done = self.request_count.load(Ordering::SeqCst);
        let limit = self.fail_after_requests.load(Ordering::SeqCst);
        if limit > 0 && done >= limit {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::NotConnected);
        }
        let drop_at = self.drop_link_at.load(Ordering::SeqCst);
        if drop_at > 0 && done + 1 >= drop_at {
            self.drop_link_at.store(0, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::NotConnected);
        }
        let request = RequestPage::from_bytes(data)?;
        self.request_count.fetch_add(1, Ordering::SeqCst);
        state.pending = Some(PendingRequest {
            request,
            polls_left: state.polls_until_ready,
            next_row: None,
        });
        Ok(())
    }

    fn flag(state: &mut RingState) -> ResponseFlag {
        let Some(pending) = state.pending.as_mut() else {
            return ResponseFlag::Failed(MOCK_REJECT_FLAG);
        };
        let page = pending.request.page;
        if let Some(flag) = state.rejected.get(&page) {
            return ResponseFlag::Failed(*flag);
        }
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return ResponseFlag::NotReady;
        }
        match state.pages.get(&page) {
            Some(p) => {
                let top = p.rows.len().saturating_sub(1) as u8;
                pending.next_row = Some(pending.request.last_row.min(top));
                ResponseFlag::Ready {
                    start_time: p.start_time,
                }
            }
            None => ResponseFlag::Failed(MOCK_REJECT_FLAG),
        }
    }

    fn response_data(state: &mut RingState) -> Result<Vec<u8>> {
        let pending = state
            .pending
            .as_mut()
            .ok_or_else(|| Error::protocol(0, "ResponseData read without a request"))?;
        let page = pending.request.page;
        let row = pending
            .next_row
            .ok_or_else(|| Error::protocol(page, "ResponseData read before ready"))?;
        if state.corrupted.contains(&page) {
            return Ok(vec![row; 7]);
        }
        let data = state
            .pages
            .get(&page)
            .and_then(|p| p.rows.get(usize::from(row)))
            .copied()
            .ok_or_else(|| Error::protocol(page, "row vanished"))?;
        pending.next_row = Some(row.saturating_sub(1));
        Ok(data.to_bytes().to_vec())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::timeout(
                "connect to device",
                std::time::Duration::from_secs(45),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        self.check_connected()?;
        let mut state = self.state.write().await;
        let bytes = match characteristic {
            c if c == DEVICE_NAME => state.name.as_bytes().to_vec(),
            c if c == LATEST_PAGE => state.latest().to_bytes().to_vec(),
            c if c == LATEST_DATA => {
                let latest = state.latest_page;
                let data = state
                    .pages
                    .get(&latest)
                    .and_then(|p| p.rows.last())
                    .copied()
                    .ok_or_else(|| Error::protocol(latest, "empty latest page"))?;
                data.to_bytes().to_vec()
            }
            c if c == RESPONSE_FLAG => Self::flag(&mut state).to_bytes().to_vec(),
            c if c == RESPONSE_DATA => Self::response_data(&mut state)?,
            c if c == TIME_INFORMATION => TimeInformation {
                unix_time: state.recording_start,
            }
            .to_bytes()
            .to_vec(),
            c if c == MEASUREMENT_INTERVAL => state.interval.to_le_bytes().to_vec(),
            c if c == ERROR_STATUS => state.error_status.to_bytes().to_vec(),
            other => return Err(Error::characteristic_not_found(other.to_string(), 3)),
        };
        Ok(bytes)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.check_connected()?;
        let mut state = self.state.write().await;
        match characteristic {
            c if c == REQUEST_PAGE => self.handle_request(&mut state, data),
            c if c == TIME_INFORMATION => {
                let time = TimeInformation::from_bytes(data)?;
                state.clock_skew =
                    i64::from(time.unix_time) - OffsetDateTime::now_utc().unix_timestamp();
                state.time_writes.push(time.unix_time);
                state.restart_recording(time.unix_time);
                Ok(())
            }
            c if c == MEASUREMENT_INTERVAL => {
                let interval = MeasurementInterval::from_bytes(data)?;
                state.interval = interval.as_secs();
                state.interval_writes.push(interval.as_secs());
                let now = state.device_now();
                state.restart_recording(now);
                Ok(())
            }
            other => Err(Error::WriteFailed {
                uuid: other.to_string(),
                reason: "not writable".to_string(),
            }),
        }
    }
}

/// Builder for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportBuilder {
    address: String,
    name: String,
    pages: u32,
    latest_row: u8,
    interval: u16,
    clock_skew: i64,
    polls_until_ready: u32,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            address: "C1:2A:3B:4C:5D:6E".to_string(),
            name: SUPPORTED_DEVICE_NAME.to_string(),
            pages: 1,
            latest_row: LAST_ROW,
            interval: 300,
            clock_skew: 0,
            polls_until_ready: 0,
        }
    }
}

impl MockTransportBuilder {
    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Pages recorded so far, starting at page 0. More than 2048 wraps.
    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = pages.max(1);
        self
    }

    /// Rows present in the latest page, as its highest row index.
    pub fn latest_row(mut self, row: u8) -> Self {
        self.latest_row = row.min(LAST_ROW);
        self
    }

    pub fn interval(mut self, secs: u16) -> Self {
        self.interval = secs;
        self
    }

    pub fn clock_skew(mut self, secs: i64) -> Self {
        self.clock_skew = secs;
        self
    }

    /// NotReady flags answered before each page becomes ready.
    pub fn polls_until_ready(mut self, polls: u32) -> Self {
        self.polls_until_ready = polls;
        self
    }

    pub fn build(self) -> MockTransport {
        let mut state = RingState {
            name: self.name,
            interval: self.interval,
            clock_skew: self.clock_skew,
            recording_start: 0,
            pages: HashMap::new(),
            latest_page: 0,
            sequence: 0,
            pending: None,
            polls_until_ready: self.polls_until_ready,
            rejected: HashMap::new(),
            corrupted: HashSet::new(),
            error_status: ErrorStatus::default(),
            time_writes: Vec::new(),
            interval_writes: Vec::new(),
        };
        // The newest sample was taken just now.
        let first_start = state
            .device_now()
            .saturating_sub(state.span() * (self.pages - 1))
            .saturating_sub(u32::from(self.interval) * u32::from(self.latest_row));
        let first_row = if self.pages == 1 { self.latest_row } else { LAST_ROW };
        state.recording_start = first_start;
        state.write_page(0, first_start, first_row);
        if self.pages > 1 {
            state.advance(self.pages - 1, self.latest_row);
        }
        debug_assert!(state.latest_page < RING_SIZE);

        MockTransport {
            address: self.address,
            connected: AtomicBool::new(false),
            state: RwLock::new(state),
            request_count: AtomicU32::new(0),
            fail_after_requests: AtomicU32::new(0),
            drop_link_at: AtomicU32::new(0),
            connect_failures: AtomicU32::new(0),
        }
    }
}

/// In-memory [`LogStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: BTreeMap<String, DeviceRecord>,
    rows: Vec<StoredRow>,
    index: HashMap<(String, u16, u8, u32), usize>,
    checkpoints: HashMap<String, SyncCheckpoint>,
    forward: Option<ForwardCheckpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn device(&self, address: &str) -> Option<&DeviceRecord> {
        self.devices.get(address)
    }
}

impl LogStore for MemoryStore {
    fn record_device(
        &mut self,
        address: &str,
        label: Option<&str>,
        clock_offset: Option<i64>,
    ) -> Result<DeviceRecord> {
        let now = OffsetDateTime::now_utc();
        let record = self
            .devices
            .entry(address.to_string())
            .or_insert_with(|| DeviceRecord {
                address: address.to_string(),
                label: None,
                clock_offset: None,
                first_seen: now,
                last_sync: now,
            });
        if let Some(label) = label {
            record.label = Some(label.to_string());
        }
        if clock_offset.is_some() {
            record.clock_offset = clock_offset;
        }
        record.last_sync = now;
        Ok(record.clone())
    }

    fn append(&mut self, device: &str, row: &LogRow, clock_offset: i64) -> Result<AppendOutcome> {
        let key = (device.to_string(), row.page, row.row, row.device_time);
        if let Some(&idx) = self.index.get(&key) {
            return Ok(if self.rows[idx].measurement == row.measurement {
                AppendOutcome::Duplicate
            } else {
                AppendOutcome::Conflict
            });
        }
        let timestamp = row.timestamp(clock_offset)?;
        let id = self.rows.len() as i64 + 1;
        self.rows.push(StoredRow {
            id,
            device: device.to_string(),
            page: row.page,
            row: row.row,
            device_time: row.device_time,
            timestamp,
            measurement: row.measurement,
        });
        self.index.insert(key, self.rows.len() - 1);
        Ok(AppendOutcome::Inserted)
    }

    fn get_checkpoint(&self, device: &str) -> Result<Option<SyncCheckpoint>> {
        Ok(self.checkpoints.get(device).copied())
    }

    fn set_checkpoint(&mut self, device: &str, checkpoint: &SyncCheckpoint) -> Result<()> {
        self.checkpoints.insert(device.to_string(), *checkpoint);
        Ok(())
    }

    fn rows_after(&self, cursor: i64, limit: usize) -> Result<Vec<StoredRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.id > cursor)
            .take(limit)
            .cloned()
            .collect())
    }

    fn forward_checkpoint(&self) -> Result<Option<ForwardCheckpoint>> {
        Ok(self.forward)
    }

    fn set_forward_checkpoint(&mut self, checkpoint: &ForwardCheckpoint) -> Result<()> {
        self.forward = Some(*checkpoint);
        Ok(())
    }
}

/// In-memory [`Sink`] that records each accepted batch.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Point>>>,
    /// (batches to accept before failing, retryable)
    failure: Mutex<Option<(usize, bool)>>,
    attempts: AtomicU32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `after` more batches, then fail every write.
    pub async fn fail_after(&self, after: usize, retryable: bool) {
        *self.failure.lock().await = Some((after, retryable));
    }

    pub async fn heal(&self) {
        *self.failure.lock().await = None;
    }

    pub async fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().await.clone()
    }

    pub async fn point_count(&self) -> usize {
        self.batches.lock().await.iter().map(Vec::len).sum()
    }

    /// Write calls received, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write_batch(&self, points: &[Point]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut failure = self.failure.lock().await;
        if let Some((after, retryable)) = failure.as_mut() {
            if *after == 0 {
                return Err(Error::sink("injected sink failure", *retryable));
            }
            *after -= 1;
        }
        self.batches.lock().await.push(points.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_lays_out_ring() {
        let device = MockTransport::builder().pages(5).latest_row(3).build();
        let latest = device.latest_page().await;
        assert_eq!(latest.page, 4);
        assert_eq!(latest.row, 3);
        assert_eq!(device.page_rows(0).await.len(), 13);
        assert_eq!(device.page_rows(4).await.len(), 4);
    }

    #[tokio::test]
    async fn test_advance_wraps_ring() {
        let device = MockTransport::builder().pages(2046).build();
        device.advance(5, 12).await;
        let latest = device.latest_page().await;
        assert_eq!(latest.page, 2);
        assert_eq!(device.page_rows(2047).await.len(), 13);
    }

    #[tokio::test]
    async fn test_advance_fills_previous_latest() {
        let device = MockTransport::builder().pages(3).latest_row(2).build();
        let before = device.latest_page().await;
        device.advance(1, 0).await;
        assert_eq!(device.page_rows(2).await.len(), 13);
        let after = device.latest_page().await;
        assert_eq!(after.page, 3);
        assert_eq!(after.start_time, before.start_time + 300 * 13);
    }

    #[tokio::test]
    async fn test_interval_write_restarts_ring() {
        let device = MockTransport::builder().pages(50).build();
        device.connect().await.unwrap();
        device
            .write(MEASUREMENT_INTERVAL, &60u16.to_le_bytes())
            .await
            .unwrap();
        let latest = device.latest_page().await;
        assert_eq!(latest.page, 0);
        assert_eq!(latest.interval, 60);
        assert_eq!(device.interval_writes().await, vec![60]);
    }

    #[tokio::test]
    async fn test_time_information_is_recording_start() {
        let device = MockTransport::builder().pages(100).build();
        device.connect().await.unwrap();
        let first = device.read(TIME_INFORMATION).await.unwrap();
        device.advance(3, 12).await;
        assert_eq!(device.read(TIME_INFORMATION).await.unwrap(), first);

        let start = TimeInformation::from_bytes(&first).unwrap().unix_time;
        assert_eq!(start, device.recording_start().await);
        assert!(start < device.latest_page().await.start_time);
    }

    #[tokio::test]
    async fn test_newest_sample_is_current() {
        let device = MockTransport::builder().pages(40).latest_row(5).build();
        let sample = device.latest_page().await.latest_sample_time().unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        assert!((now - i64::from(sample)).abs() <= 2);
    }

    #[tokio::test]
    async fn test_time_write_restarts_ring() {
        let device = MockTransport::builder().pages(50).build();
        device.connect().await.unwrap();
        let at = TimeInformation { unix_time: 1_700_000_000 };
        device.write(TIME_INFORMATION, &at.to_bytes()).await.unwrap();

        let latest = device.latest_page().await;
        assert_eq!((latest.page, latest.row), (0, 0));
        assert_eq!(latest.start_time, 1_700_000_000);
        assert_eq!(device.recording_start().await, 1_700_000_000);
        assert_eq!(device.time_writes().await, vec![1_700_000_000]);
        assert!(device.page_rows(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_require_connection() {
        let device = MockTransport::builder().build();
        assert!(matches!(
            device.read(LATEST_PAGE).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_after_requests() {
        let device = MockTransport::builder().pages(4).build();
        device.connect().await.unwrap();
        device.disconnect_after_requests(1);
        let req = RequestPage::full_page(0).unwrap().to_bytes();
        device.write(REQUEST_PAGE, &req).await.unwrap();
        assert!(device.write(REQUEST_PAGE, &req).await.is_err());
        assert!(!device.is_connected());
    }

    #[tokio::test]
    async fn test_dropped_link_recovers_on_reconnect() {
        let device = MockTransport::builder().pages(4).build();
        device.connect().await.unwrap();
        device.drop_link_after_requests(1);
        let req = RequestPage::full_page(0).unwrap().to_bytes();
        device.write(REQUEST_PAGE, &req).await.unwrap();
        assert!(matches!(
            device.write(REQUEST_PAGE, &req).await,
            Err(Error::NotConnected)
        ));
        assert!(!device.is_connected());

        device.connect().await.unwrap();
        device.write(REQUEST_PAGE, &req).await.unwrap();
        device.write(REQUEST_PAGE, &req).await.unwrap();
        assert_eq!(device.request_count(), 3);
    }

    #[test]
    fn test_memory_store_write_once() {
        let mut store = MemoryStore::new();
        let row = LogRow {
            page: 1,
            row: 2,
            device_time: 1000,
            measurement: Measurement::default(),
        };
        assert_eq!(store.append("dev", &row, 0).unwrap(), AppendOutcome::Inserted);
        assert_eq!(store.append("dev", &row, 5).unwrap(), AppendOutcome::Duplicate);

        let mut changed = row;
        changed.measurement.temperature = 30.0;
        assert_eq!(store.append("dev", &changed, 0).unwrap(), AppendOutcome::Conflict);
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.rows()[0].measurement.temperature, 0.0);

        // Same ring slot in a later revolution is a new row.
        let later = LogRow {
            device_time: 999_000,
            ..row
        };
        assert_eq!(store.append("dev", &later, 0).unwrap(), AppendOutcome::Inserted);
        assert_eq!(store.rows_after(1, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_sink_failure_injection() {
        let sink = MemorySink::new();
        sink.fail_after(1, false).await;
        assert!(sink.write_batch(&[]).await.is_ok());
        assert!(sink.write_batch(&[]).await.is_err());
        sink.heal().await;
        assert!(sink.write_batch(&[]).await.is_ok());
        assert_eq!(sink.batches().await.len(), 2);
        assert_eq!(sink.attempts(), 3);
    }
}
