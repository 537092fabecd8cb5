//! Error types for characteristic decoding in envsensor-types.

use thiserror::Error;

/// Errors that can occur when decoding or encoding characteristic payloads.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in envsensor-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload was shorter than the fixed layout requires.
    #[error("Insufficient bytes: expected {expected}, got {actual}")]
    InsufficientBytes { expected: usize, actual: usize },

    /// A field decoded to a value outside its documented range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A ring position outside 0..=2047.
    #[error("Page {0} is outside the ring (0..=2047)")]
    PageOutOfRange(u16),

    /// A row index outside 0..=12.
    #[error("Row {0} is outside the page (0..=12)")]
    RowOutOfRange(u8),

    /// A sample time past the end of the device's 32-bit clock.
    #[error("Sample time overflows: page start {start_time} + {interval}s x row {row}")]
    TimeOverflow {
        start_time: u32,
        interval: u16,
        row: u8,
    },
}

impl ParseError {
    /// Create an [`ParseError::InvalidValue`] from any displayable message.
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }
}

/// Result type alias using envsensor-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
