//! Error types for sensorhub-core.
//!
//! Codec failures fall into two groups. Parse and encode failures happen on
//! the ingestion side and cause the message to be dropped. Decode and
//! unsupported-version failures happen on the query side and cause the stored
//! row to be skipped.
//!
//! | Error | Raised by | Caller handling |
//! |-------|-----------|-----------------|
//! | [`CodecError::Parse`] | wire parser | drop message |
//! | [`CodecError::PayloadTooLarge`] | encoder | drop message before any write |
//! | [`CodecError::DeviceTypeMismatch`] | encoder | drop message |
//! | [`CodecError::Decode`] | decoder | skip row |
//! | [`CodecError::UnsupportedVersion`] | registry | drop message / skip row |

use thiserror::Error;

use sensorhub_types::{DecodeError, DeviceType, ParseError};

/// Errors produced by payload codecs and the codec registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The wire message is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A stored payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The compact encoding exceeds the storage limit.
    #[error("Encoded payload is {len} bytes, limit is {max}")]
    PayloadTooLarge {
        /// Length of the encoded payload in bytes.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// No codec is registered for this device type and version.
    #[error("Unsupported payload version {version} for {device_type}")]
    UnsupportedVersion {
        device_type: DeviceType,
        version: u32,
    },

    /// A record was handed to the codec of another device type.
    #[error("Codec for {expected} cannot handle a {found} record")]
    DeviceTypeMismatch {
        expected: DeviceType,
        found: DeviceType,
    },
}

/// Result type alias using sensorhub-core's error type.
pub type Result<T> = std::result::Result<T, CodecError>;
