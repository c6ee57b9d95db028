//! Water-level meter, payload version 1.
//!
//! Wire field `wl` (required) carries the averaged level in centimetres.
//! The compact form is `wl:<level>` with two fraction digits.

use sensorhub_types::{DecodedRecord, DeviceType, WaterLevelReading};

use super::{PayloadCodec, bounded, decode_float, fill, mismatch, segments, take};
use crate::error::Result;
use crate::wire::{WireMessage, parse_float};

const KEYS: &[&str] = &["wl"];

/// Codec for water-level meter payloads, version 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaterMeterV1;

impl WaterMeterV1 {
    pub const VERSION: u32 = 1;
}

impl PayloadCodec for WaterMeterV1 {
    fn device_type(&self) -> DeviceType {
        DeviceType::WaterLevelMeter
    }

    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn parse(&self, message: &WireMessage<'_>) -> Result<DecodedRecord> {
        let wl = message.required_field("wl", 1)?;
        Ok(DecodedRecord::WaterLevel(WaterLevelReading {
            average_water_level_cm: parse_float("wl", wl[0])?,
        }))
    }

    fn encode(&self, record: &DecodedRecord) -> Result<String> {
        let DecodedRecord::WaterLevel(reading) = record else {
            return Err(mismatch(self.device_type(), record));
        };
        bounded(format!("wl:{:.2}", reading.average_water_level_cm))
    }

    fn decode(&self, payload: &str) -> Result<DecodedRecord> {
        let mut level = None;
        for segment in segments(payload, KEYS, 1) {
            let (key, v) = segment?;
            fill(&mut level, key, decode_float(key, v[0])?)?;
        }

        Ok(DecodedRecord::WaterLevel(WaterLevelReading {
            average_water_level_cm: take(level, "wl")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use sensorhub_types::{DecodeError, HydroponicReading, ParseError};

    fn parse(text: &str) -> Result<DecodedRecord> {
        WaterMeterV1.parse(&WireMessage::tokenize(text)?)
    }

    fn level(record: DecodedRecord) -> f32 {
        match record {
            DecodedRecord::WaterLevel(r) => r.average_water_level_cm,
            other => panic!("expected water level record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_water_level() {
        assert_eq!(level(parse("1;c;F00D;wl:42.37").unwrap()), 42.37);
    }

    #[test]
    fn test_parse_missing_wl() {
        assert_eq!(
            parse("1;c;F00D;relay:1:0"),
            Err(CodecError::Parse(ParseError::MissingField("wl")))
        );
    }

    #[test]
    fn test_parse_wl_arity() {
        assert_eq!(
            parse("1;c;F00D;wl:1:2"),
            Err(CodecError::Parse(ParseError::Arity {
                key: "wl",
                expected: 1,
                found: 2
            }))
        );
    }

    #[test]
    fn test_parse_wl_not_numeric() {
        assert_eq!(
            parse("1;c;F00D;wl:deep"),
            Err(CodecError::Parse(ParseError::InvalidValue {
                key: "wl",
                token: "deep".to_string()
            }))
        );
    }

    #[test]
    fn test_encode_two_decimals() {
        let record = DecodedRecord::WaterLevel(WaterLevelReading {
            average_water_level_cm: 7.0,
        });
        assert_eq!(WaterMeterV1.encode(&record).unwrap(), "wl:7.00");

        let record = DecodedRecord::WaterLevel(WaterLevelReading {
            average_water_level_cm: 12.345,
        });
        let payload = WaterMeterV1.encode(&record).unwrap();
        assert!(payload == "wl:12.35" || payload == "wl:12.34", "{payload}");
    }

    #[test]
    fn test_encode_wrong_device_type() {
        let record = DecodedRecord::Hydroponic(HydroponicReading::default());
        assert!(matches!(
            WaterMeterV1.encode(&record),
            Err(CodecError::DeviceTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode() {
        assert_eq!(level(WaterMeterV1.decode("wl:15.20").unwrap()), 15.2);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(
            WaterMeterV1.decode("wl:1:2"),
            Err(CodecError::Decode(DecodeError::Arity {
                key: "wl",
                expected: 2,
                found: 3
            }))
        );
        assert_eq!(
            WaterMeterV1.decode("wl:1.00;wl:2.00"),
            Err(CodecError::Decode(DecodeError::DuplicateKey("wl")))
        );
        assert_eq!(
            WaterMeterV1.decode("T:1.00:0"),
            Err(CodecError::Decode(DecodeError::UnknownKey("T".to_string())))
        );
        assert!(matches!(
            WaterMeterV1.decode("wl:abc"),
            Err(CodecError::Decode(DecodeError::InvalidValue { key: "wl", .. }))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Levels survive encode/decode to two-decimal precision.
        #[test]
        fn encode_decode_round_trip(cm in -1_000.0f32..1_000.0) {
            let record = DecodedRecord::WaterLevel(WaterLevelReading {
                average_water_level_cm: cm,
            });
            let payload = WaterMeterV1.encode(&record).unwrap();
            let DecodedRecord::WaterLevel(decoded) = WaterMeterV1.decode(&payload).unwrap() else {
                panic!("expected water level record");
            };
            prop_assert!((decoded.average_water_level_cm - cm).abs() <= 0.006);
        }
    }
}
