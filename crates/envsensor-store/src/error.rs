//! Error types for envsensor-store.

use std::path::PathBuf;

/// Result type for envsensor-store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A stored value does not fit its Rust type.
    #[error("Invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for envsensor_core::Error {
    fn from(error: Error) -> Self {
        envsensor_core::Error::store(error)
    }
}
