//! One sync session against one device.
//!
//! A session connects, checks the device identity, ring position and clock
//! drift, then either changes the measurement interval or reads the pages
//! the planner selects and appends them to the store. The checkpoint moves
//! only after the whole planned range has been fetched and stored, so an
//! interrupted session re-reads the same range next time and the store
//! absorbs the duplicates.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use envsensor_types::codec;
use envsensor_types::uuid::{
    DEVICE_NAME, ERROR_STATUS, LATEST_DATA, LATEST_PAGE, MEASUREMENT_INTERVAL,
    SUPPORTED_DEVICE_NAME, TIME_INFORMATION,
};
use envsensor_types::{ErrorStatus, LatestPage, MeasurementInterval, TimeInformation};

use crate::error::{Error, Result};
use crate::handshake::{HandshakeConfig, PageData, fetch_page};
use crate::models::{AppendSummary, SyncCheckpoint};
use crate::planner::{DataLoss, IncrementalSyncPlanner, PlanReason, PlannerConfig, SyncPlan};
use crate::retry::{RetryConfig, with_retry};
use crate::traits::{LogStore, Transport};

/// Session stage reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Connecting,
    Identifying,
    ClockCheck,
    Planning,
    Fetching,
    Done,
}

/// Progress of one session.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub device: String,
    pub phase: SyncPhase,
    pub pages_done: usize,
    pub pages_total: usize,
    /// Page just fetched, while fetching.
    pub page: Option<u16>,
}

impl SyncProgress {
    /// Fraction of planned pages fetched (0.0 to 1.0).
    pub fn fraction(&self) -> f32 {
        if self.pages_total == 0 {
            0.0
        } else {
            self.pages_done as f32 / self.pages_total as f32
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Per-session behaviour.
#[derive(Clone)]
pub struct SessionOptions {
    /// Read only. No interval change, no store writes.
    pub dry_run: bool,
    /// Stop after identity and clock checks.
    pub no_scan: bool,
    /// Drift beyond this is applied to row timestamps.
    pub time_drift_tolerance: Duration,
    /// Change the measurement interval instead of scanning.
    pub set_interval: Option<MeasurementInterval>,
    /// Explicit inclusive page range; bypasses the planner and the checkpoint.
    pub page_range: Option<(u16, u16)>,
    pub label: Option<String>,
    pub handshake: HandshakeConfig,
    pub planner: PlannerConfig,
    pub connect_retry: RetryConfig,
    pub page_retry: RetryConfig,
    pub progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("dry_run", &self.dry_run)
            .field("no_scan", &self.no_scan)
            .field("time_drift_tolerance", &self.time_drift_tolerance)
            .field("set_interval", &self.set_interval)
            .field("page_range", &self.page_range)
            .field("label", &self.label)
            .field("handshake", &self.handshake)
            .field("planner", &self.planner)
            .field("connect_retry", &self.connect_retry)
            .field("page_retry", &self.page_retry)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            no_scan: false,
            time_drift_tolerance: Duration::from_secs(30),
            set_interval: None,
            page_range: None,
            label: None,
            handshake: HandshakeConfig::default(),
            planner: PlannerConfig::default(),
            connect_retry: RetryConfig::for_connect(),
            page_retry: RetryConfig::for_page(),
            progress_callback: None,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    #[must_use]
    pub fn no_scan(mut self, enabled: bool) -> Self {
        self.no_scan = enabled;
        self
    }

    #[must_use]
    pub fn time_drift_tolerance(mut self, tolerance: Duration) -> Self {
        self.time_drift_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn set_interval(mut self, interval: MeasurementInterval) -> Self {
        self.set_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn page_range(mut self, start: u16, end: u16) -> Self {
        self.page_range = Some((start, end));
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn handshake(mut self, config: HandshakeConfig) -> Self {
        self.handshake = config;
        self
    }

    #[must_use]
    pub fn planner(mut self, config: PlannerConfig) -> Self {
        self.planner = config;
        self
    }

    #[must_use]
    pub fn connect_retry(mut self, config: RetryConfig) -> Self {
        self.connect_retry = config;
        self
    }

    #[must_use]
    pub fn page_retry(mut self, config: RetryConfig) -> Self {
        self.page_retry = config;
        self
    }

    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(SyncProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn report_progress(&self, progress: &SyncProgress) {
        if let Some(cb) = &self.progress_callback {
            cb(progress.clone());
        }
    }
}

/// What a session did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub address: String,
    pub name: String,
    /// Host minus device clock, applied to row timestamps. Zero while the
    /// drift is within tolerance.
    pub clock_offset: i64,
    pub error_status: ErrorStatus,
    pub latest: Option<LatestPage>,
    /// TimeInformation: when the device started its current recording.
    pub recording_start: Option<u32>,
    pub plan_reason: Option<PlanReason>,
    pub data_loss: Option<DataLoss>,
    pub pages_read: usize,
    pub rows_read: usize,
    pub rows: AppendSummary,
    /// Checkpoint written at the end of the session.
    pub checkpoint: Option<SyncCheckpoint>,
    pub interval_changed: Option<MeasurementInterval>,
}

/// Drives one device through connect, identify, clock check and scan.
pub struct DeviceSession<'a, T: Transport + ?Sized, S: LogStore + ?Sized> {
    transport: &'a T,
    store: &'a mut S,
    options: &'a SessionOptions,
    report: SessionReport,
}

impl<'a, T: Transport + ?Sized, S: LogStore + ?Sized> DeviceSession<'a, T, S> {
    pub fn new(transport: &'a T, store: &'a mut S, options: &'a SessionOptions) -> Self {
        let report = SessionReport {
            address: transport.address().to_string(),
            ..Default::default()
        };
        Self {
            transport,
            store,
            options,
            report,
        }
    }

    /// Run the session. The transport is disconnected on every exit path
    /// after a successful connect.
    pub async fn run(mut self) -> Result<SessionReport> {
        self.progress(SyncPhase::Connecting, 0, 0, None);
        let transport = self.transport;
        with_retry(&self.options.connect_retry, "connect", || transport.connect()).await?;

        let result = self.run_connected().await;
        if let Err(e) = self.transport.disconnect().await {
            warn!("disconnect failed: {}", e);
        }
        result.map(|()| self.report)
    }

    async fn run_connected(&mut self) -> Result<()> {
        self.progress(SyncPhase::Identifying, 0, 0, None);
        self.identify().await?;

        self.progress(SyncPhase::ClockCheck, 0, 0, None);
        let latest = self.read_position().await?;
        self.check_clock(&latest)?;
        self.log_status().await?;

        if !self.options.dry_run {
            self.store.record_device(
                &self.report.address,
                self.options.label.as_deref(),
                Some(self.report.clock_offset),
            )?;
        }

        if let Some(interval) = self.options.set_interval {
            return self.change_interval(interval).await;
        }
        if self.options.no_scan {
            let interval =
                codec::decode_interval(&self.transport.read(MEASUREMENT_INTERVAL).await?)?;
            info!(%interval, "measurement interval");
            info!("device check passed, scan skipped");
            self.progress(SyncPhase::Done, 0, 0, None);
            return Ok(());
        }
        self.scan(latest).await
    }

    async fn identify(&mut self) -> Result<()> {
        let bytes = self.transport.read(DEVICE_NAME).await?;
        let name = codec::decode_device_name(&bytes)?;
        if name != SUPPORTED_DEVICE_NAME {
            return Err(Error::UnsupportedDevice(format!(
                "{} reports name {:?}",
                self.report.address, name
            )));
        }
        debug!(name = %name, "device identified");
        self.report.name = name;
        Ok(())
    }

    /// Read the ring position and the recording start.
    async fn read_position(&mut self) -> Result<LatestPage> {
        let latest = codec::decode_latest_page(&self.transport.read(LATEST_PAGE).await?)?;
        let recording = codec::decode_time(&self.transport.read(TIME_INFORMATION).await?)?;
        info!(
            page = latest.page,
            row = latest.row,
            start_time = latest.start_time,
            interval = latest.interval,
            recording_start = recording.unix_time,
            "ring position"
        );
        self.report.latest = Some(latest);
        self.report.recording_start = Some(recording.unix_time);
        Ok(latest)
    }

    /// Compare the newest sample's device time with the host clock.
    ///
    /// A device that keeps time took its newest sample at most one interval
    /// ago, so only a difference outside that window is drift. The device
    /// clock is not written here: writing it restarts recording.
    fn check_clock(&mut self, latest: &LatestPage) -> Result<()> {
        let sample = i64::from(latest.latest_sample_time()?);
        let age = OffsetDateTime::now_utc().unix_timestamp() - sample;
        let tolerance =
            i64::try_from(self.options.time_drift_tolerance.as_secs()).unwrap_or(i64::MAX);
        let window = i64::from(latest.interval).saturating_add(tolerance);

        let offset = if age < -tolerance {
            age
        } else if age > window {
            age - i64::from(latest.interval)
        } else {
            0
        };
        self.report.clock_offset = offset;
        if offset == 0 {
            debug!(age, "device clock within tolerance");
        } else {
            warn!(offset, "device clock drifted, applying offset to row timestamps");
        }
        Ok(())
    }

    async fn write_host_time(&self) -> Result<()> {
        let now = TimeInformation::from_datetime(OffsetDateTime::now_utc())?;
        self.transport
            .write(TIME_INFORMATION, &codec::encode_time(now))
            .await
    }

    async fn log_status(&mut self) -> Result<()> {
        let latest = codec::decode_response(&self.transport.read(LATEST_DATA).await?)?;
        let m = &latest.measurement;
        info!(
            temperature = m.temperature,
            humidity = m.humidity,
            light = m.light,
            pressure = m.pressure,
            noise = m.noise,
            battery = m.battery_voltage,
            "latest reading"
        );

        let status = codec::decode_error(&self.transport.read(ERROR_STATUS).await?)?;
        if status.has_error() {
            error!(code = status.code(), "device reports fault: {}", status);
        }
        self.report.error_status = status;
        Ok(())
    }

    /// Write the new interval, then the clock. Writing the clock restarts
    /// recording at page 0, so the checkpoint is reset to follow it.
    async fn change_interval(&mut self, interval: MeasurementInterval) -> Result<()> {
        let current = codec::decode_interval(&self.transport.read(MEASUREMENT_INTERVAL).await?)?;
        info!(from = %current, to = %interval, "changing measurement interval");
        if self.options.dry_run {
            info!("dry run, not writing interval or clock");
        } else {
            self.transport
                .write(MEASUREMENT_INTERVAL, &interval.to_bytes())
                .await?;
            self.write_host_time().await?;
        }

        let latest = self.read_position().await?;
        if self.options.dry_run {
            self.progress(SyncPhase::Done, 0, 0, None);
            return Ok(());
        }

        let checkpoint =
            SyncCheckpoint::after_ring_reset(latest.start_time, self.report.recording_start);
        self.store
            .set_checkpoint(&self.report.address, &checkpoint)?;
        info!(page = latest.page, "measurement interval changed, ring restarted");

        self.report.checkpoint = Some(checkpoint);
        self.report.interval_changed = Some(interval);
        self.progress(SyncPhase::Done, 0, 0, None);
        Ok(())
    }

    async fn scan(&mut self, latest: LatestPage) -> Result<()> {
        self.progress(SyncPhase::Planning, 0, 0, None);

        let plan = match self.options.page_range {
            Some((start, end)) => SyncPlan::explicit(start, end, &latest)?,
            None => {
                let checkpoint = self.store.get_checkpoint(&self.report.address)?;
                let planner = IncrementalSyncPlanner::new(self.options.planner.clone());
                match planner.plan(checkpoint.as_ref(), &latest, self.report.recording_start)? {
                    Some(plan) => plan,
                    None => {
                        self.progress(SyncPhase::Done, 0, 0, None);
                        return Ok(());
                    }
                }
            }
        };
        self.report.plan_reason = Some(plan.reason);
        self.report.data_loss = plan.data_loss;

        let total = plan.page_count();
        info!(
            start = plan.range.start(),
            end = plan.range.end(),
            pages = total,
            reason = ?plan.reason,
            "fetching pages"
        );
        self.progress(SyncPhase::Fetching, 0, total, None);

        let mut last: Option<PageData> = None;
        for (done, page) in plan.range.clone().enumerate() {
            let data = self.fetch(page, plan.last_row_for(page), latest.interval).await?;
            self.store_page(&data)?;
            self.report.pages_read += 1;
            info!(page, rows = data.rows.len(), "page {}/{} stored", done + 1, total);
            self.progress(SyncPhase::Fetching, done + 1, total, Some(page));
            last = Some(data);
        }

        if let Some(last) = last
            && plan.advances_checkpoint()
            && !self.options.dry_run
        {
            let checkpoint = SyncCheckpoint {
                page: last.page,
                row: last.last_row().unwrap_or(0),
                timestamp: last.start_time,
                ring_reset: false,
                recording_start: self.report.recording_start,
            };
            self.store
                .set_checkpoint(&self.report.address, &checkpoint)?;
            debug!(page = checkpoint.page, row = checkpoint.row, "checkpoint advanced");
            self.report.checkpoint = Some(checkpoint);
        }

        info!(
            pages = self.report.pages_read,
            inserted = self.report.rows.inserted,
            duplicate = self.report.rows.duplicate,
            conflict = self.report.rows.conflict,
            "scan complete"
        );
        self.progress(SyncPhase::Done, total, total, None);
        Ok(())
    }

    async fn fetch(&self, page: u16, last_row: u8, interval: u16) -> Result<PageData> {
        let transport = self.transport;
        let handshake = &self.options.handshake;
        let name = format!("fetch page {page}");
        with_retry(&self.options.page_retry, &name, || async move {
            // Reconnects after a dropped link; a no-op while connected.
            transport.connect().await?;
            fetch_page(transport, page, last_row, interval, handshake).await
        })
        .await
    }

    fn store_page(&mut self, data: &PageData) -> Result<()> {
        self.report.rows_read += data.rows.len();
        if self.options.dry_run {
            return Ok(());
        }
        let summary =
            self.store
                .append_page(&self.report.address, &data.rows, self.report.clock_offset)?;
        if summary.conflict > 0 {
            warn!(
                page = data.page,
                conflicts = summary.conflict,
                "rows differ from stored copies; keeping stored rows"
            );
        }
        self.report.rows.merge(summary);
        Ok(())
    }

    fn progress(&self, phase: SyncPhase, pages_done: usize, pages_total: usize, page: Option<u16>) {
        self.options.report_progress(&SyncProgress {
            device: self.report.address.clone(),
            phase,
            pages_done,
            pages_total,
            page,
        });
    }
}

/// Run one session with a fresh [`DeviceSession`].
#[tracing::instrument(level = "info", skip_all, fields(device = %transport.address()))]
pub async fn sync_device<T, S>(
    transport: &T,
    store: &mut S,
    options: &SessionOptions,
) -> Result<SessionReport>
where
    T: Transport + ?Sized,
    S: LogStore + ?Sized,
{
    DeviceSession::new(transport, store, options).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryStore, MockTransport};
    use std::sync::Mutex;

    fn quick() -> SessionOptions {
        SessionOptions::new()
            .handshake(HandshakeConfig {
                poll_attempts: 3,
                poll_interval: Duration::from_millis(1),
                spare_reads: 3,
            })
            .connect_retry(RetryConfig::none())
            .page_retry(RetryConfig::new(1).initial_delay(Duration::from_millis(1)).jitter(false))
    }

    #[tokio::test]
    async fn test_first_sync_reads_latest_page() {
        let device = MockTransport::builder().pages(20).latest_row(5).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick()).await.unwrap();

        assert_eq!(report.plan_reason, Some(PlanReason::Initial));
        assert_eq!(report.pages_read, 1);
        assert_eq!(report.rows.inserted, 6);
        let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
        assert_eq!((cp.page, cp.row), (19, 5));
        assert!(!device.is_connected());
    }

    #[tokio::test]
    async fn test_unsupported_device_is_rejected() {
        let device = MockTransport::builder().name("Other-Thing").build();
        let mut store = MemoryStore::new();
        let err = sync_device(&device, &mut store, &quick()).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedDevice(_)));
        assert!(store.device(device.address()).is_none());
        assert!(!device.is_connected());
    }

    #[tokio::test]
    async fn test_slow_clock_offsets_row_timestamps() {
        // Newest sample 600s old against a 300s interval: 300s of drift.
        let device = MockTransport::builder().pages(2).clock_skew(-600).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick()).await.unwrap();

        assert!((298..=302).contains(&report.clock_offset));
        assert!(device.time_writes().await.is_empty());
        let row = &store.rows()[0];
        assert_eq!(
            row.timestamp.unix_timestamp(),
            i64::from(row.device_time) + report.clock_offset
        );
    }

    #[tokio::test]
    async fn test_fast_clock_offsets_row_timestamps() {
        let device = MockTransport::builder().pages(2).clock_skew(600).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick()).await.unwrap();
        assert!((-602..=-598).contains(&report.clock_offset));
        assert!(device.time_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_small_drift_left_alone() {
        let device = MockTransport::builder().pages(2).clock_skew(5).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick()).await.unwrap();
        assert_eq!(report.clock_offset, 0);
        assert!(device.time_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_recording_start_is_not_the_clock() {
        // Recording began about 100 pages (4.5 days) ago.
        let device = MockTransport::builder().pages(100).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick()).await.unwrap();

        let recording_start = device.recording_start().await;
        assert_eq!(report.recording_start, Some(recording_start));
        assert_eq!(report.clock_offset, 0);
        assert!(device.time_writes().await.is_empty());
        for row in store.rows() {
            assert_eq!(row.timestamp.unix_timestamp(), i64::from(row.device_time));
        }
        let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
        assert_eq!(cp.recording_start, Some(recording_start));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let device = MockTransport::builder().pages(5).clock_skew(3600).build();
        let mut store = MemoryStore::new();
        let options = quick().dry_run(true);
        let report = sync_device(&device, &mut store, &options).await.unwrap();

        assert_eq!(report.pages_read, 1);
        assert_eq!(report.rows_read, 13);
        assert!(report.clock_offset < 0);
        assert!(device.time_writes().await.is_empty());
        assert!(store.rows().is_empty());
        assert!(store.get_checkpoint(device.address()).unwrap().is_none());
        assert!(store.device(device.address()).is_none());
    }

    #[tokio::test]
    async fn test_no_scan_skips_pages() {
        let device = MockTransport::builder().pages(5).build();
        let mut store = MemoryStore::new();
        let report = sync_device(&device, &mut store, &quick().no_scan(true))
            .await
            .unwrap();
        assert_eq!(report.pages_read, 0);
        assert_eq!(device.request_count(), 0);
        assert_eq!(report.latest.map(|l| l.page), Some(4));
        assert_eq!(report.recording_start, Some(device.recording_start().await));
        assert!(store.device(device.address()).is_some());
    }

    #[tokio::test]
    async fn test_explicit_range_keeps_checkpoint() {
        let device = MockTransport::builder().pages(30).build();
        let mut store = MemoryStore::new();
        sync_device(&device, &mut store, &quick()).await.unwrap();
        let before = store.get_checkpoint(device.address()).unwrap();

        let report = sync_device(&device, &mut store, &quick().page_range(2, 4))
            .await
            .unwrap();
        assert_eq!(report.pages_read, 3);
        assert_eq!(report.plan_reason, Some(PlanReason::Override));
        assert_eq!(store.get_checkpoint(device.address()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_set_interval_resets_ring() {
        let device = MockTransport::builder().pages(30).build();
        let mut store = MemoryStore::new();
        let interval = MeasurementInterval::new(60).unwrap();
        let report = sync_device(&device, &mut store, &quick().set_interval(interval))
            .await
            .unwrap();

        assert_eq!(report.interval_changed, Some(interval));
        assert_eq!(report.pages_read, 0);
        assert_eq!(device.interval_writes().await, vec![60]);
        assert_eq!(device.time_writes().await.len(), 1);
        let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
        assert!(cp.ring_reset);
    }

    #[tokio::test]
    async fn test_set_interval_dry_run_only_reads() {
        let device = MockTransport::builder().pages(30).build();
        let mut store = MemoryStore::new();
        let interval = MeasurementInterval::new(60).unwrap();
        let options = quick().set_interval(interval).dry_run(true);
        let report = sync_device(&device, &mut store, &options).await.unwrap();

        assert_eq!(report.interval_changed, None);
        assert_eq!(report.latest.map(|l| l.page), Some(29));
        assert_eq!(report.recording_start, Some(device.recording_start().await));
        assert!(device.interval_writes().await.is_empty());
        assert!(device.time_writes().await.is_empty());
        assert!(store.get_checkpoint(device.address()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_retry_reconnects() {
        let device = MockTransport::builder().pages(6).build();
        let mut store = MemoryStore::new();
        let options = quick().planner(PlannerConfig {
            initial_scan: crate::planner::InitialScan::FromZero,
            ..Default::default()
        });
        device.drop_link_after_requests(2);

        let report = sync_device(&device, &mut store, &options).await.unwrap();
        assert_eq!(report.pages_read, 6);
        assert_eq!(store.rows().len(), 6 * 13);
        let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
        assert_eq!(cp.page, 5);
    }

    #[tokio::test]
    async fn test_connect_retried() {
        let device = MockTransport::builder().pages(2).build();
        device.fail_connects(2);
        let mut store = MemoryStore::new();
        let options = quick().connect_retry(
            RetryConfig::new(2)
                .initial_delay(Duration::from_millis(1))
                .jitter(false),
        );
        assert!(sync_device(&device, &mut store, &options).await.is_ok());
    }

    #[tokio::test]
    async fn test_progress_reported() {
        let device = MockTransport::builder().pages(4).build();
        let mut store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = quick()
            .planner(PlannerConfig {
                initial_scan: crate::planner::InitialScan::FromZero,
                ..Default::default()
            })
            .with_progress(move |p| sink.lock().unwrap().push(p));
        sync_device(&device, &mut store, &options).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().map(|p| p.phase), Some(SyncPhase::Connecting));
        assert_eq!(seen.last().map(|p| p.phase), Some(SyncPhase::Done));
        let fetched: Vec<_> = seen.iter().filter_map(|p| p.page).collect();
        assert_eq!(fetched, vec![0, 1, 2, 3]);
    }
}
