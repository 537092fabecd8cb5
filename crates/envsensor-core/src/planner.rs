//! Works out which ring pages are new since the last run.
//!
//! The device reports only its current write position, so the planner
//! combines it with the stored [`SyncCheckpoint`]. Positions alone cannot
//! tell "5 pages later" from "5 pages plus a full revolution later", so the
//! distance is unwrapped with the page start times: one page spans
//! `13 × interval` seconds of device time.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use envsensor_types::ring::{self, LAST_ROW, PageRange, RING_SIZE};
use envsensor_types::LatestPage;

use crate::error::{Error, Result};
use crate::models::SyncCheckpoint;

/// What to read from a device that has never been synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialScan {
    /// Only the page currently being written.
    #[default]
    LatestPage,
    /// Everything from page 0 up to the latest page.
    FromZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// How far (device seconds) the latest page may start before the
    /// checkpointed page before it counts as a clock rewind.
    pub clock_tolerance_secs: u32,
    pub initial_scan: InitialScan,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            clock_tolerance_secs: 30,
            initial_scan: InitialScan::LatestPage,
        }
    }
}

/// Why a plan covers the range it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanReason {
    /// No checkpoint yet.
    Initial,
    /// Pages after the checkpoint.
    Incremental,
    /// The ring was restarted by an interval change.
    RingReset,
    /// Page start times went backwards; the device clock or ring was reset.
    ClockRewind,
    /// More pages were written than the ring holds; the oldest are gone.
    Overrun,
    /// Range given explicitly by the operator.
    Override,
}

/// Unread pages the device overwrote before they could be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataLoss {
    /// Pages written since the checkpoint.
    pub unread_pages: u64,
    /// Of those, pages no longer on the device.
    pub lost_pages: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub range: PageRange,
    pub latest: LatestPage,
    pub reason: PlanReason,
    pub data_loss: Option<DataLoss>,
}

impl SyncPlan {
    fn new(start: u16, latest: &LatestPage, reason: PlanReason) -> Result<Self> {
        Ok(Self {
            range: ring::expand_range(start, latest.page)?,
            latest: *latest,
            reason,
            data_loss: None,
        })
    }

    /// An operator-chosen range. Never advances the checkpoint.
    pub fn explicit(start: u16, end: u16, latest: &LatestPage) -> Result<Self> {
        Ok(Self {
            range: ring::expand_range(start, end)?,
            latest: *latest,
            reason: PlanReason::Override,
            data_loss: None,
        })
    }

    /// Rows to request for `page`: the latest page is only partly written.
    pub fn last_row_for(&self, page: u16) -> u8 {
        if page == self.latest.page {
            self.latest.row
        } else {
            LAST_ROW
        }
    }

    pub fn page_count(&self) -> usize {
        self.range.len()
    }

    /// Whether completing this plan should move the checkpoint.
    pub fn advances_checkpoint(&self) -> bool {
        self.reason != PlanReason::Override
    }
}

#[derive(Debug, Clone, Default)]
pub struct IncrementalSyncPlanner {
    config: PlannerConfig,
}

impl IncrementalSyncPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compute the range to fetch, or `None` when nothing new was written.
    ///
    /// `recording_start` is the device's current TimeInformation. When it
    /// differs from the one stored with the checkpoint, the ring was
    /// restarted since the last sync and the scan starts at page 0.
    pub fn plan(
        &self,
        checkpoint: Option<&SyncCheckpoint>,
        latest: &LatestPage,
        recording_start: Option<u32>,
    ) -> Result<Option<SyncPlan>> {
        let Some(cp) = checkpoint else {
            let start = match self.config.initial_scan {
                InitialScan::LatestPage => latest.page,
                InitialScan::FromZero => 0,
            };
            info!(start, end = latest.page, "initial scan");
            return SyncPlan::new(start, latest, PlanReason::Initial).map(Some);
        };

        if cp.ring_reset {
            info!(end = latest.page, "ring was reset, scanning from page 0");
            return SyncPlan::new(0, latest, PlanReason::RingReset).map(Some);
        }

        if let (Some(seen), Some(now)) = (cp.recording_start, recording_start)
            && seen != now
        {
            info!(
                previous = seen,
                current = now,
                end = latest.page,
                "recording restarted since the last sync, scanning from page 0"
            );
            return SyncPlan::new(0, latest, PlanReason::RingReset).map(Some);
        }

        if cp.timestamp > latest.start_time.saturating_add(self.config.clock_tolerance_secs) {
            warn!(
                checkpoint_time = cp.timestamp,
                latest_time = latest.start_time,
                "latest page starts before the checkpoint, scanning from page 0"
            );
            return SyncPlan::new(0, latest, PlanReason::ClockRewind).map(Some);
        }

        let span = u64::from(latest.page_span_secs());
        if span == 0 {
            return Err(Error::protocol(latest.page, "device reports a zero interval"));
        }

        let ring_len = u64::from(RING_SIZE);
        let positional = u64::from((latest.page + RING_SIZE - cp.page) % RING_SIZE);
        let elapsed = (u64::from(latest.start_time.saturating_sub(cp.timestamp)) + span / 2) / span;
        let revolutions = (elapsed.saturating_sub(positional) + ring_len / 2) / ring_len;
        if revolutions == 0 && positional > elapsed + 1 {
            // More pages ahead than time allows: the ring restarted and
            // refilled past the checkpointed position.
            warn!(
                checkpoint_page = cp.page,
                latest_page = latest.page,
                elapsed_pages = elapsed,
                "ring restarted outside a session, scanning from page 0"
            );
            return SyncPlan::new(0, latest, PlanReason::RingReset).map(Some);
        }
        let advanced = positional + revolutions * ring_len;
        let needed = advanced + u64::from(cp.is_partial());

        if advanced == 0 {
            if cp.is_partial() && latest.row > cp.row {
                return SyncPlan::new(cp.page, latest, PlanReason::Incremental).map(Some);
            }
            info!(page = cp.page, row = cp.row, "no new rows");
            return Ok(None);
        }

        if needed > ring_len {
            let loss = DataLoss {
                unread_pages: needed,
                lost_pages: needed - ring_len,
            };
            warn!(
                unread = loss.unread_pages,
                lost = loss.lost_pages,
                "ring overwrote unread pages, reading the whole ring"
            );
            let start = ring::next_page(latest.page);
            let mut plan = SyncPlan::new(start, latest, PlanReason::Overrun)?;
            plan.data_loss = Some(loss);
            return Ok(Some(plan));
        }

        let start = if cp.is_partial() {
            cp.page
        } else {
            ring::next_page(cp.page)
        };
        SyncPlan::new(start, latest, PlanReason::Incremental).map(Some)
    }
}
