//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use sensorhub_types::DeviceType;

/// Location recorded for devices registered from their first message.
pub const DEFAULT_LOCATION: &str = "Unknown";

/// A device stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoredDevice {
    /// Database row ID.
    pub id: i64,
    /// Firmware identity (ESP fuse MAC).
    pub fuse_id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    /// Device type, `None` if the stored name is not a known type.
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    /// WiFi signal strength.
    pub wifi_strength: i32,
    pub battery_percent: i32,
    /// Time of the last accepted reading.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A device to register on first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub fuse_id: String,
    pub device_type: DeviceType,
    pub name: String,
    pub description: String,
    pub location: String,
}

impl NewDevice {
    /// A device with the default name, description and location of its type.
    pub fn with_defaults(fuse_id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            fuse_id: fuse_id.into(),
            device_type,
            name: device_type.default_name().to_string(),
            description: device_type.default_description().to_string(),
            location: DEFAULT_LOCATION.to_string(),
        }
    }
}

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    pub device_id: i64,
    /// Device type discriminator (see [`DeviceType::topic_id`]).
    pub topic_id: u8,
    pub payload_version: u32,
    /// Compact payload.
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A reading to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReading<'a> {
    pub device_id: i64,
    pub topic_id: u8,
    pub payload_version: u32,
    pub payload: &'a str,
    pub created_at: OffsetDateTime,
}
