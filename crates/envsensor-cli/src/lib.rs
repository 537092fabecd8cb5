//! Command-line interface for EnvSensor BLE environment sensors.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Read new log pages from the configured devices into SQLite |
//! | `forward` | Push rows not yet forwarded to InfluxDB |
//! | `set-interval` | Change a device's measurement interval (restarts its log) |
//!
//! # Configuration
//!
//! Settings live in `~/.config/envsensor/config.toml` (or the platform
//! equivalent); `--config` selects another file. Command-line flags
//! override the file.
//!
//! ```toml
//! [storage]
//! path = "~/.local/share/envsensor/envsensor.db"
//!
//! [[devices]]
//! address = "C1:2A:3B:4C:5D:6E"
//! label = "living-room"
//!
//! [sync]
//! time_drift_tolerance_secs = 30
//! initial_scan = "latest-page"
//!
//! [influxdb]
//! host = "localhost"
//! database = "envsensor"
//! ```
//!
//! # Environment Variables
//!
//! - `ENVSENSOR_CONFIG`: configuration file (overridden by `--config`)
//! - `ENVSENSOR_DEVICE`: device address for `--addr`
//! - `RUST_LOG`: log filter when neither `-v` nor `-q` is given
//!
//! # Examples
//!
//! Sync every configured device:
//! ```bash
//! envsensor sync
//! ```
//!
//! Re-read a page range across the ring wrap without touching the checkpoint:
//! ```bash
//! envsensor sync --addr C1:2A:3B:4C:5D:6E --page-range 2046 1
//! ```
//!
//! Set a one-minute interval:
//! ```bash
//! envsensor set-interval --addr C1:2A:3B:4C:5D:6E 60
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod style;

pub use envsensor_core;
pub use envsensor_store;
