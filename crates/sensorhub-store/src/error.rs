//! Error types for sensorhub-store.

use std::path::PathBuf;

/// Result type for sensorhub-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sensorhub-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Device not found in database.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Payload longer than the storage limit.
    #[error("Payload is {len} bytes, limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },
}
