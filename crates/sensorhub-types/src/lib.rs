//! Platform-agnostic types for sensorhub telemetry.
//!
//! This crate provides the shared vocabulary used by the codec crate
//! (sensorhub-core), the store (sensorhub-store) and the service.
//!
//! # Features
//!
//! - Device types and their registry defaults
//! - The severity classifier
//! - Typed readings for every device type
//! - Error types for wire parsing and storage decoding
//!
//! # Example
//!
//! ```
//! use sensorhub_types::{DeviceType, SeverityLevel};
//!
//! assert_eq!(DeviceType::WaterLevelMeter.topic_id(), 1);
//! assert_eq!(SeverityLevel::classify(65), SeverityLevel::Warning);
//! ```

pub mod error;
pub mod types;

pub use error::{
    DecodeError, DecodeResult, InvalidSeverity, ParseError, ParseResult, UnknownDeviceType,
};
pub use types::{
    CRITICAL_THRESHOLD, DecodedRecord, DeviceType, HydroponicReading, HydroponicSensors,
    MAX_COMPACT_PAYLOAD_LEN, RelayState, SeverityLevel, WARNING_THRESHOLD, WaterLevelReading,
};
