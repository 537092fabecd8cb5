//! Local persistence for EnvSensor log rows.
//!
//! This crate provides the SQLite-backed [`LogStore`](envsensor_core::LogStore)
//! used by the `envsensor` CLI.
//!
//! # Features
//!
//! - Write-once log rows keyed by device, ring position and device time
//! - Per-device sync checkpoints and the forwarder's cursor
//! - Device records with label and last observed clock offset
//! - Query by device, time range or page, with pagination
//!
//! # Example
//!
//! ```no_run
//! use envsensor_store::{RowQuery, Store};
//!
//! let store = Store::open_default()?;
//!
//! let query = RowQuery::new()
//!     .device("C1:2A:3B:4C:5D:6E")
//!     .newest_first()
//!     .limit(10);
//! let rows = store.query_rows(&query)?;
//! # Ok::<(), envsensor_store::Error>(())
//! ```

mod error;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use queries::RowQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/envsensor/envsensor.db`
/// - macOS: `~/Library/Application Support/envsensor/envsensor.db`
/// - Windows: `C:\Users\<user>\AppData\Local\envsensor\envsensor.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("envsensor")
        .join("envsensor.db")
}
