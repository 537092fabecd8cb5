//! Paged-log extraction and incremental sync for EnvSensor BLE sensors.
//!
//! An EnvSensor logs one measurement row per interval into a ring of 2048
//! pages of 13 rows. This crate reads those pages over BLE and keeps a
//! local store in step with the device:
//!
//! - [`handshake`]: the request, flag poll and row read protocol for one page
//! - [`planner`]: which pages are new since the stored checkpoint
//! - [`session`]: one device sync (identity, clock, interval, scan)
//! - [`runner`]: every configured device, one after another
//! - [`forward`]: push stored rows to a time-series sink
//!
//! The engines talk to the device, the store and the sink through the
//! traits in [`traits`], so they run unchanged against the in-memory
//! doubles in [`mock`].
//!
//! # Platform Differences
//!
//! On Linux and Windows devices are identified by MAC address. macOS hides
//! addresses, so the CoreBluetooth peripheral UUID is used instead; it is
//! stable per Mac but differs between machines.
//!
//! # Quick Start
//!
//! ```no_run
//! use envsensor_core::device::{BleTransport, ConnectionConfig};
//! use envsensor_core::mock::MemoryStore;
//! use envsensor_core::{SessionOptions, sync_device};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = BleTransport::open("C1:2A:3B:4C:5D:6E", ConnectionConfig::default()).await?;
//!     let mut store = MemoryStore::new();
//!     let report = sync_device(&transport, &mut store, &SessionOptions::default()).await?;
//!     println!("read {} pages", report.pages_read);
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod forward;
pub mod handshake;
#[cfg(feature = "influxdb")]
pub mod influx;
pub mod mock;
pub mod models;
pub mod planner;
pub mod retry;
pub mod runner;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

pub use device::{BleTransport, ConnectionConfig};
pub use error::{Error, Result};
pub use forward::{ForwardOptions, ForwardResult, ForwardSyncEngine, forward_rows};
pub use handshake::{HandshakeConfig, HandshakeState, PageData, PageRequestHandshake, fetch_page};
#[cfg(feature = "influxdb")]
pub use influx::{InfluxConfig, InfluxSink};
pub use models::{
    AppendOutcome, AppendSummary, DeviceRecord, FieldValue, ForwardCheckpoint, Point, StoredRow,
    SyncCheckpoint,
};
pub use planner::{
    DataLoss, IncrementalSyncPlanner, InitialScan, PlanReason, PlannerConfig, SyncPlan,
};
pub use retry::{RetryConfig, with_retry};
pub use runner::{DeviceFailure, DeviceTarget, RunSummary, sync_devices};
pub use scan::{DiscoveredDevice, ScanOptions};
pub use session::{
    DeviceSession, SessionOptions, SessionReport, SyncPhase, SyncProgress, sync_device,
};
pub use traits::{LogStore, Sink, Transport};

pub use envsensor_types::uuid as uuids;
pub use envsensor_types::{
    ErrorStatus, LatestPage, LogRow, Measurement, MeasurementInterval, ParseError,
};
