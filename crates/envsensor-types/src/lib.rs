//! Platform-agnostic types for EnvSensor BLE environment sensors.
//!
//! This crate holds everything about the device contract that does not need
//! a radio: characteristic payload layouts, the UUIDs they live under, and
//! arithmetic over the device's fixed ring of log pages.
//!
//! # Example
//!
//! ```
//! use envsensor_types::{LatestPage, ring};
//!
//! let bytes = [0x43, 0x91, 0xe5, 0x5e, 0x2c, 0x01, 0x09, 0x02, 0x0b];
//! let latest = LatestPage::from_bytes(&bytes).unwrap();
//! assert_eq!(latest.page, 521);
//! assert_eq!(ring::page_distance(500, latest.page).unwrap(), 22);
//! ```

pub mod codec;
pub mod error;
pub mod ring;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use ring::{PageRange, RING_SIZE, expand_range, page_distance};
pub use types::{
    ErrorClass, ErrorStatus, LatestPage, LogRow, Measurement, MeasurementInterval, RequestPage,
    ResponseData, ResponseFlag, TimeInformation, sample_time,
};
pub use uuid as uuids;
