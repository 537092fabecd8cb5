//! Sync every configured device, one after another.
//!
//! A failing device is logged and recorded in the summary; the run moves on
//! to the next device. Only the caller decides whether any failure makes the
//! whole run fail.

use std::future::Future;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::session::{SessionOptions, SessionReport, sync_device};
use crate::traits::{LogStore, Transport};

/// A device to sync and its per-device overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub address: String,
    pub label: Option<String>,
    /// Explicit inclusive page range for this device.
    pub page_range: Option<(u16, u16)>,
}

impl DeviceTarget {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: None,
            page_range: None,
        }
    }
}

#[derive(Debug)]
pub struct DeviceFailure {
    pub address: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SessionReport>,
    pub failures: Vec<DeviceFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sync `targets` in order. `open` resolves a target to a transport.
pub async fn sync_devices<S, T, F, Fut>(
    targets: &[DeviceTarget],
    store: &mut S,
    options: &SessionOptions,
    open: F,
) -> RunSummary
where
    S: LogStore + ?Sized,
    T: Transport,
    F: Fn(&DeviceTarget) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut summary = RunSummary::default();
    for target in targets {
        let mut device_options = options.clone();
        if target.label.is_some() {
            device_options.label = target.label.clone();
        }
        if target.page_range.is_some() {
            device_options.page_range = target.page_range;
        }

        let outcome = match open(target).await {
            Ok(transport) => sync_device(&transport, &mut *store, &device_options).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => {
                info!(
                    device = %target.address,
                    pages = report.pages_read,
                    inserted = report.rows.inserted,
                    "device synced"
                );
                summary.reports.push(report);
            }
            Err(e) => {
                error!(device = %target.address, "sync failed: {}", e);
                summary.failures.push(DeviceFailure {
                    address: target.address.clone(),
                    error: e,
                });
            }
        }
    }
    summary
}
