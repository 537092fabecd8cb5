//! Error types for envsensor-core.
//!
//! # Recovery
//!
//! | Error Type | Strategy |
//! |------------|----------|
//! | [`Error::Timeout`] | Retry the page handshake |
//! | [`Error::Bluetooth`] | Retry, then abandon this device for the run |
//! | [`Error::NotConnected`] | Abandon this device for the run |
//! | [`Error::PollExhausted`] | Retry the page handshake |
//! | [`Error::DeviceError`] | Abandon this device's scan, no checkpoint advance |
//! | [`Error::Decode`] | Abandon this device's scan, no checkpoint advance |
//! | [`Error::Protocol`] | Abandon this device's scan, no checkpoint advance |
//! | [`Error::Sink`] | Retry if `retryable`, otherwise stop forwarding |
//! | [`Error::InvalidConfig`] | Fix configuration and restart |
//!
//! Per-device failures never abort the whole run; see [`crate::runner`].

use std::time::Duration;

use thiserror::Error;

use envsensor_types::{ErrorStatus, ParseError};

/// Errors that can occur while syncing EnvSensor devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No adapter, or the device did not show up in a scan.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound { uuid: String, service_count: usize },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed { uuid: String, reason: String },

    /// A payload from the device did not decode.
    #[error("Decode error: {0}")]
    Decode(#[from] ParseError),

    /// The device answered a page request with a failure flag.
    #[error("Device rejected page {page} (flag 0x{flag:02X}, status: {status})")]
    DeviceError {
        page: u16,
        flag: u8,
        status: ErrorStatus,
    },

    /// The response flag never reported ready.
    #[error("Page {page} not ready after {attempts} polls")]
    PollExhausted { page: u16, attempts: u32 },

    /// The device broke the page read protocol.
    #[error("Protocol error on page {page}: {reason}")]
    Protocol { page: u16, reason: String },

    /// The peripheral is not an EnvSensor.
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// LogStore failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Time-series sink failure.
    #[error("Sink error: {message}")]
    Sink { message: String, retryable: bool },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(identifier.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    pub fn protocol(page: u16, reason: impl Into<String>) -> Self {
        Self::Protocol {
            page,
            reason: reason.into(),
        }
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    pub fn sink(message: impl Into<String>, retryable: bool) -> Self {
        Self::Sink {
            message: message.into(),
            retryable,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using envsensor-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
