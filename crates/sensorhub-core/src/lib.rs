//! Telemetry codecs and aggregation for sensorhub devices.
//!
//! This crate turns the text messages published by hydroponic controllers
//! and water-level meters into typed records, compresses those records into
//! a storage form of at most [`MAX_COMPACT_PAYLOAD_LEN`] bytes, and turns
//! stored payloads back into time-bucketed series.
//!
//! # Features
//!
//! - **Wire parsing**: positional header plus order-independent fields
//! - **Versioned codecs**: one [`PayloadCodec`] per device type and payload version
//! - **Codec registry**: several versions of a device type live side by side
//! - **Aggregation**: fixed-width buckets with gap placeholders
//!
//! # Supported Devices
//!
//! | Device | Versions | Wire fields | Stored as |
//! |--------|----------|-------------|-----------|
//! | Hydroponic manager | 1 | `sensor` (14 values), `relay` (2 values) | `T M pH C N P K R` |
//! | Water-level meter | 1 | `wl` | `wl` |
//!
//! # Quick Start
//!
//! ```
//! use sensorhub_core::{CodecRegistry, EncodedSample, SensorSeries, build_series};
//! use sensorhub_types::DeviceType;
//! use time::OffsetDateTime;
//!
//! let registry = CodecRegistry::builtin();
//!
//! // Ingestion side: wire message to compact payload
//! let parsed = registry.parse_message(DeviceType::WaterLevelMeter, "1;client;F00D;wl:41.5")?;
//! let payload = registry.encode(parsed.version, &parsed.record)?;
//! assert_eq!(payload, "wl:41.50");
//!
//! // Query side: stored payloads to a series
//! let rows = [EncodedSample {
//!     timestamp: OffsetDateTime::UNIX_EPOCH,
//!     payload_version: parsed.version,
//!     payload: &payload,
//! }];
//! let start = OffsetDateTime::UNIX_EPOCH;
//! let outcome = build_series(&registry, DeviceType::WaterLevelMeter, &rows, start, 0);
//! assert!(matches!(outcome.series, SensorSeries::WaterLevel(ref points) if points.len() == 1));
//! # Ok::<(), sensorhub_core::CodecError>(())
//! ```

pub mod aggregate;
pub mod codec;
pub mod error;
pub mod registry;
pub mod series;
pub mod wire;

// Re-export the shared types crate for downstream convenience
pub use sensorhub_types as types;

pub use aggregate::{Aggregate, DataPoint, MAX_BUCKETS, Sample, aggregate, bucket_count};
pub use codec::{HydroponicV1, MAX_COMPACT_PAYLOAD_LEN, PayloadCodec, WaterMeterV1};
pub use error::{CodecError, Result};
pub use registry::{CodecRegistry, ParsedMessage};
pub use series::{EncodedSample, SensorSeries, SeriesOutcome, build_series};
pub use wire::WireMessage;
