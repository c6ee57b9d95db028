//! Core types for device telemetry.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{InvalidSeverity, UnknownDeviceType};

/// Upper bound on a compact storage payload, in bytes.
pub const MAX_COMPACT_PAYLOAD_LEN: usize = 128;

/// Kind of device publishing telemetry.
///
/// Every device type owns its own record shape, wire grammar and storage
/// grammar. The stored name (see [`DeviceType::as_str`]) is what the device
/// registry persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DeviceType {
    /// Hydroponic controller: soil/water chemistry sensors plus a pump relay.
    HydroponicManager,
    /// Ultrasonic water-level meter.
    WaterLevelMeter,
}

impl DeviceType {
    /// All known device types.
    pub const ALL: [DeviceType; 2] = [DeviceType::HydroponicManager, DeviceType::WaterLevelMeter];

    /// Name stored in the device registry.
    ///
    /// ```
    /// use sensorhub_types::DeviceType;
    ///
    /// assert_eq!(DeviceType::HydroponicManager.as_str(), "hydroponic-manager");
    /// assert_eq!("water-level-meter".parse(), Ok(DeviceType::WaterLevelMeter));
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::HydroponicManager => "hydroponic-manager",
            DeviceType::WaterLevelMeter => "water-level-meter",
        }
    }

    /// Topic discriminator stored alongside every reading.
    #[must_use]
    pub fn topic_id(&self) -> u8 {
        match self {
            DeviceType::HydroponicManager => 0,
            DeviceType::WaterLevelMeter => 1,
        }
    }

    /// Look up a device type by its topic discriminator.
    #[must_use]
    pub fn from_topic_id(topic_id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.topic_id() == topic_id)
    }

    /// Name given to a device registered from its first message.
    #[must_use]
    pub fn default_name(&self) -> &'static str {
        match self {
            DeviceType::HydroponicManager => "Hydroponic Manager",
            DeviceType::WaterLevelMeter => "Water Level Meter",
        }
    }

    /// Description given to a device registered from its first message.
    #[must_use]
    pub fn default_description(&self) -> &'static str {
        match self {
            DeviceType::HydroponicManager => "Hydroponic Manager Device",
            DeviceType::WaterLevelMeter => "Water Level Meter Device",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownDeviceType(s.to_string()))
    }
}

/// Severity of a measurement against fixed thresholds.
///
/// Ordered by severity so comparisons like `level >= SeverityLevel::Warning`
/// work. Serialized as its ordinal (`0`, `1`, `2`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "u8", try_from = "u8"))]
#[repr(u8)]
pub enum SeverityLevel {
    #[default]
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

/// Lower bound (inclusive) of [`SeverityLevel::Warning`].
pub const WARNING_THRESHOLD: i32 = 50;

/// Lower bound (inclusive) of [`SeverityLevel::Critical`].
pub const CRITICAL_THRESHOLD: i32 = 80;

impl SeverityLevel {
    /// Classify a measurement.
    ///
    /// ```
    /// use sensorhub_types::SeverityLevel;
    ///
    /// assert_eq!(SeverityLevel::classify(49), SeverityLevel::Normal);
    /// assert_eq!(SeverityLevel::classify(50), SeverityLevel::Warning);
    /// assert_eq!(SeverityLevel::classify(80), SeverityLevel::Critical);
    /// ```
    #[must_use]
    pub fn classify(value: i32) -> Self {
        if value >= CRITICAL_THRESHOLD {
            SeverityLevel::Critical
        } else if value >= WARNING_THRESHOLD {
            SeverityLevel::Warning
        } else {
            SeverityLevel::Normal
        }
    }

    /// The ordinal value transmitted by devices.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for SeverityLevel {
    type Error = InvalidSeverity;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeverityLevel::Normal),
            1 => Ok(SeverityLevel::Warning),
            2 => Ok(SeverityLevel::Critical),
            other => Err(InvalidSeverity(other)),
        }
    }
}

impl TryFrom<u8> for SeverityLevel {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<SeverityLevel> for u8 {
    fn from(level: SeverityLevel) -> Self {
        level.ordinal()
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Normal => write!(f, "Normal"),
            SeverityLevel::Warning => write!(f, "Warning"),
            SeverityLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Sensor block of a hydroponic controller reading.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct HydroponicSensors {
    /// Temperature in Celsius.
    pub temperature: f32,
    pub temperature_severity: SeverityLevel,
    /// Moisture percentage.
    pub moisture: f32,
    pub moisture_severity: SeverityLevel,
    pub ph: f32,
    pub ph_severity: SeverityLevel,
    /// Electrical conductivity (uS/cm).
    pub conductivity: i32,
    pub conductivity_severity: SeverityLevel,
    /// Nitrogen (mg/kg).
    pub nitrogen: i32,
    pub nitrogen_severity: SeverityLevel,
    /// Phosphorus (mg/kg).
    pub phosphorus: i32,
    pub phosphorus_severity: SeverityLevel,
    /// Potassium (mg/kg).
    pub potassium: i32,
    pub potassium_severity: SeverityLevel,
}

/// Pump relay state reported by a hydroponic controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RelayState {
    pub is_on: bool,
    /// Seconds until the controller toggles the relay on its own.
    pub next_toggle_in_seconds: i32,
}

/// A complete hydroponic controller reading.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HydroponicReading {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub sensors: HydroponicSensors,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub relay: RelayState,
}

/// A water-level meter reading.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct WaterLevelReading {
    /// Water level averaged by the device over its sampling window, in cm.
    pub average_water_level_cm: f32,
}

/// A typed reading for any device type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DecodedRecord {
    Hydroponic(HydroponicReading),
    WaterLevel(WaterLevelReading),
}

impl DecodedRecord {
    /// Device type this record belongs to.
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        match self {
            DecodedRecord::Hydroponic(_) => DeviceType::HydroponicManager,
            DecodedRecord::WaterLevel(_) => DeviceType::WaterLevelMeter,
        }
    }
}

impl From<HydroponicReading> for DecodedRecord {
    fn from(reading: HydroponicReading) -> Self {
        DecodedRecord::Hydroponic(reading)
    }
}

impl From<WaterLevelReading> for DecodedRecord {
    fn from(reading: WaterLevelReading) -> Self {
        DecodedRecord::WaterLevel(reading)
    }
}

impl TryFrom<DecodedRecord> for HydroponicReading {
    type Error = DeviceType;

    /// Fails with the record's actual device type.
    fn try_from(record: DecodedRecord) -> Result<Self, Self::Error> {
        match record {
            DecodedRecord::Hydroponic(reading) => Ok(reading),
            other => Err(other.device_type()),
        }
    }
}

impl TryFrom<DecodedRecord> for WaterLevelReading {
    type Error = DeviceType;

    /// Fails with the record's actual device type.
    fn try_from(record: DecodedRecord) -> Result<Self, Self::Error> {
        match record {
            DecodedRecord::WaterLevel(reading) => Ok(reading),
            other => Err(other.device_type()),
        }
    }
}
