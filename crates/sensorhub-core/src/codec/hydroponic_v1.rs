//! Hydroponic controller, payload version 1.
//!
//! Wire fields (both required):
//!
//! - `sensor`: 14 values, value/severity pairs in the order moisture,
//!   temperature, conductivity, pH, nitrogen, phosphorus, potassium
//! - `relay`: on/off flag and seconds until the next toggle
//!
//! Compact form:
//!
//! ```text
//! T:22.10:0;M:45.50:0;pH:6.50:0;C:1200:0;N:40:0;P:30:0;K:20:0;R:true:30
//! ```

use sensorhub_types::{
    DecodedRecord, DeviceType, HydroponicReading, HydroponicSensors, RelayState,
};

use super::{
    PayloadCodec, bounded, decode_bool, decode_float, decode_int, decode_severity, fill, mismatch,
    segments, take,
};
use crate::error::Result;
use crate::wire::{WireMessage, parse_bool, parse_float, parse_int, parse_severity};

const SENSOR_VALUES: usize = 14;
const RELAY_VALUES: usize = 2;

const KEYS: &[&str] = &["T", "M", "pH", "C", "N", "P", "K", "R"];

/// Codec for hydroponic controller payloads, version 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct HydroponicV1;

impl HydroponicV1 {
    pub const VERSION: u32 = 1;

    fn parse_sensors(values: &[&str]) -> Result<HydroponicSensors> {
        Ok(HydroponicSensors {
            moisture: parse_float("sensor.moisture", values[0])?,
            moisture_severity: parse_severity("sensor.moistureSeverity", values[1])?,
            temperature: parse_float("sensor.temperature", values[2])?,
            temperature_severity: parse_severity("sensor.temperatureSeverity", values[3])?,
            conductivity: parse_int("sensor.conductivity", values[4])?,
            conductivity_severity: parse_severity("sensor.conductivitySeverity", values[5])?,
            ph: parse_float("sensor.ph", values[6])?,
            ph_severity: parse_severity("sensor.phSeverity", values[7])?,
            nitrogen: parse_int("sensor.nitrogen", values[8])?,
            nitrogen_severity: parse_severity("sensor.nitrogenSeverity", values[9])?,
            phosphorus: parse_int("sensor.phosphorus", values[10])?,
            phosphorus_severity: parse_severity("sensor.phosphorusSeverity", values[11])?,
            potassium: parse_int("sensor.potassium", values[12])?,
            potassium_severity: parse_severity("sensor.potassiumSeverity", values[13])?,
        })
    }

    fn parse_relay(values: &[&str]) -> Result<RelayState> {
        Ok(RelayState {
            is_on: parse_bool("relay.isOn", values[0])?,
            next_toggle_in_seconds: parse_int("relay.nextToggleInSeconds", values[1])?,
        })
    }
}

impl PayloadCodec for HydroponicV1 {
    fn device_type(&self) -> DeviceType {
        DeviceType::HydroponicManager
    }

    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn parse(&self, message: &WireMessage<'_>) -> Result<DecodedRecord> {
        let sensor = message.required_field("sensor", SENSOR_VALUES)?;
        let relay = message.required_field("relay", RELAY_VALUES)?;

        Ok(DecodedRecord::Hydroponic(HydroponicReading {
            sensors: Self::parse_sensors(&sensor)?,
            relay: Self::parse_relay(&relay)?,
        }))
    }

    fn encode(&self, record: &DecodedRecord) -> Result<String> {
        let DecodedRecord::Hydroponic(reading) = record else {
            return Err(mismatch(self.device_type(), record));
        };
        let s = &reading.sensors;
        let r = &reading.relay;

        bounded(format!(
            "T:{:.2}:{};M:{:.2}:{};pH:{:.2}:{};C:{}:{};N:{}:{};P:{}:{};K:{}:{};R:{}:{}",
            s.temperature,
            s.temperature_severity.ordinal(),
            s.moisture,
            s.moisture_severity.ordinal(),
            s.ph,
            s.ph_severity.ordinal(),
            s.conductivity,
            s.conductivity_severity.ordinal(),
            s.nitrogen,
            s.nitrogen_severity.ordinal(),
            s.phosphorus,
            s.phosphorus_severity.ordinal(),
            s.potassium,
            s.potassium_severity.ordinal(),
            r.is_on,
            r.next_toggle_in_seconds,
        ))
    }

    fn decode(&self, payload: &str) -> Result<DecodedRecord> {
        let mut temperature = None;
        let mut moisture = None;
        let mut ph = None;
        let mut conductivity = None;
        let mut nitrogen = None;
        let mut phosphorus = None;
        let mut potassium = None;
        let mut relay = None;

        for segment in segments(payload, KEYS, 2) {
            let (key, v) = segment?;
            match key {
                "T" => fill(
                    &mut temperature,
                    key,
                    (decode_float(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "M" => fill(
                    &mut moisture,
                    key,
                    (decode_float(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "pH" => fill(
                    &mut ph,
                    key,
                    (decode_float(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "C" => fill(
                    &mut conductivity,
                    key,
                    (decode_int(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "N" => fill(
                    &mut nitrogen,
                    key,
                    (decode_int(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "P" => fill(
                    &mut phosphorus,
                    key,
                    (decode_int(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                "K" => fill(
                    &mut potassium,
                    key,
                    (decode_int(key, v[0])?, decode_severity(key, v[1])?),
                )?,
                // "R" is the only key left in KEYS
                _ => fill(
                    &mut relay,
                    key,
                    RelayState {
                        is_on: decode_bool(key, v[0])?,
                        next_toggle_in_seconds: decode_int(key, v[1])?,
                    },
                )?,
            }
        }

        let (temperature, temperature_severity) = take(temperature, "T")?;
        let (moisture, moisture_severity) = take(moisture, "M")?;
        let (ph, ph_severity) = take(ph, "pH")?;
        let (conductivity, conductivity_severity) = take(conductivity, "C")?;
        let (nitrogen, nitrogen_severity) = take(nitrogen, "N")?;
        let (phosphorus, phosphorus_severity) = take(phosphorus, "P")?;
        let (potassium, potassium_severity) = take(potassium, "K")?;
        let relay = take(relay, "R")?;

        Ok(DecodedRecord::Hydroponic(HydroponicReading {
            sensors: HydroponicSensors {
                temperature,
                temperature_severity,
                moisture,
                moisture_severity,
                ph,
                ph_severity,
                conductivity,
                conductivity_severity,
                nitrogen,
                nitrogen_severity,
                phosphorus,
                phosphorus_severity,
                potassium,
                potassium_severity,
            },
            relay,
        }))
    }
}


/// Property-based tests for the hydroponic v1 codec.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use sensorhub_types::SeverityLevel;

    fn severity() -> impl Strategy<Value = SeverityLevel> {
        prop_oneof![
            Just(SeverityLevel::Normal),
            Just(SeverityLevel::Warning),
            Just(SeverityLevel::Critical),
        ]
    }

    prop_compose! {
        fn reading()(
            floats in (-100.0f32..200.0, 0.0f32..100.0, 0.0f32..14.0),
            ints in (0i32..100_000, 0i32..10_000, 0i32..10_000, 0i32..10_000),
            severities in proptest::collection::vec(severity(), 7),
            is_on in any::<bool>(),
            next_toggle_in_seconds in 0i32..86_400,
        ) -> HydroponicReading {
            HydroponicReading {
                sensors: HydroponicSensors {
                    temperature: floats.0,
                    temperature_severity: severities[0],
                    moisture: floats.1,
                    moisture_severity: severities[1],
                    ph: floats.2,
                    ph_severity: severities[2],
                    conductivity: ints.0,
                    conductivity_severity: severities[3],
                    nitrogen: ints.1,
                    nitrogen_severity: severities[4],
                    phosphorus: ints.2,
                    phosphorus_severity: severities[5],
                    potassium: ints.3,
                    potassium_severity: severities[6],
                },
                relay: RelayState { is_on, next_toggle_in_seconds },
            }
        }
    }

    proptest! {
        /// Decoding an encoded record restores it within two-decimal precision.
        #[test]
        fn encode_decode_round_trip(original in reading()) {
            let payload = HydroponicV1.encode(&DecodedRecord::Hydroponic(original)).unwrap();
            prop_assert!(payload.len() <= crate::codec::MAX_COMPACT_PAYLOAD_LEN);

            let DecodedRecord::Hydroponic(decoded) = HydroponicV1.decode(&payload).unwrap() else {
                panic!("expected hydroponic record");
            };
            let (a, b) = (original.sensors, decoded.sensors);
            prop_assert!((a.temperature - b.temperature).abs() <= 0.006);
            prop_assert!((a.moisture - b.moisture).abs() <= 0.006);
            prop_assert!((a.ph - b.ph).abs() <= 0.006);
            prop_assert_eq!(a.conductivity, b.conductivity);
            prop_assert_eq!(a.nitrogen, b.nitrogen);
            prop_assert_eq!(a.phosphorus, b.phosphorus);
            prop_assert_eq!(a.potassium, b.potassium);
            prop_assert_eq!(a.temperature_severity, b.temperature_severity);
            prop_assert_eq!(a.potassium_severity, b.potassium_severity);
            prop_assert_eq!(original.relay, decoded.relay);
        }

        /// Decoding arbitrary text never panics.
        #[test]
        fn decode_never_panics(payload in ".{0,160}") {
            let _ = HydroponicV1.decode(&payload);
        }

        /// Parsing arbitrary text never panics.
        #[test]
        fn parse_never_panics(text in ".{0,200}") {
            if let Ok(message) = WireMessage::tokenize(&text) {
                let _ = HydroponicV1.parse(&message);
            }
        }
    }
}
