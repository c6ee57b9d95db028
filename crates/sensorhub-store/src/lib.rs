//! Local data persistence for sensorhub telemetry.
//!
//! This crate provides SQLite-based storage for the device registry and the
//! append-only log of compact sensor payloads.
//!
//! # Features
//!
//! - Register devices on first contact, keyed by firmware fuse id
//! - Append compact payloads (at most 128 bytes, also enforced by a `CHECK`)
//! - Half-open, time-ordered range queries per device
//!
//! # Example
//!
//! ```
//! use sensorhub_store::{NewDevice, NewReading, Store};
//! use sensorhub_types::DeviceType;
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let device = store.get_or_create_device(&NewDevice::with_defaults(
//!     "240AC4A1B2C3",
//!     DeviceType::WaterLevelMeter,
//! ))?;
//!
//! let now = OffsetDateTime::now_utc();
//! store.insert_reading(&NewReading {
//!     device_id: device.id,
//!     topic_id: DeviceType::WaterLevelMeter.topic_id(),
//!     payload_version: 1,
//!     payload: "wl:41.50",
//!     created_at: now,
//! })?;
//!
//! let window = Duration::minutes(1);
//! let readings = store.query_range(device.id, now - window, now + window)?;
//! assert_eq!(readings.len(), 1);
//! # Ok::<(), sensorhub_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{DEFAULT_LOCATION, NewDevice, NewReading, StoredDevice, StoredReading};
pub use queries::ReadingQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/sensorhub/data.db`
/// - macOS: `~/Library/Application Support/sensorhub/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\sensorhub\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("sensorhub")
        .join("data.db")
}
