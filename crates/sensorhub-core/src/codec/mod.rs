//! Per-device, per-version payload codecs.
//!
//! A codec owns three transformations for one `(DeviceType, version)` pair:
//!
//! - [`PayloadCodec::parse`]: wire message to typed record
//! - [`PayloadCodec::encode`]: typed record to compact storage string
//! - [`PayloadCodec::decode`]: compact storage string back to typed record
//!
//! The compact form is a `;`-separated list of `key:value[:value...]`
//! segments that must fit in [`MAX_COMPACT_PAYLOAD_LEN`] bytes.

mod hydroponic_v1;
mod water_meter_v1;

pub use hydroponic_v1::HydroponicV1;
pub use water_meter_v1::WaterMeterV1;

pub use sensorhub_types::MAX_COMPACT_PAYLOAD_LEN;

use sensorhub_types::{DecodeError, DecodeResult, DecodedRecord, DeviceType, SeverityLevel};

use crate::error::{CodecError, Result};
use crate::wire::{self, SeverityToken, WireMessage};

/// A codec for one payload version of one device type.
///
/// Implementations must be pure: the registry shares them across tasks.
pub trait PayloadCodec: Send + Sync {
    /// Device type this codec handles.
    fn device_type(&self) -> DeviceType;

    /// Payload version this codec handles.
    fn version(&self) -> u32;

    /// Extract a typed record from a tokenized wire message.
    fn parse(&self, message: &WireMessage<'_>) -> Result<DecodedRecord>;

    /// Encode a record into its compact storage form.
    ///
    /// Fails with [`CodecError::PayloadTooLarge`] when the result would
    /// exceed [`MAX_COMPACT_PAYLOAD_LEN`].
    fn encode(&self, record: &DecodedRecord) -> Result<String>;

    /// Decode a compact payload produced by [`PayloadCodec::encode`].
    fn decode(&self, payload: &str) -> Result<DecodedRecord>;
}

/// Reject payloads over the storage limit.
pub(crate) fn bounded(payload: String) -> Result<String> {
    if payload.len() > MAX_COMPACT_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_COMPACT_PAYLOAD_LEN,
        });
    }
    Ok(payload)
}

pub(crate) fn mismatch(expected: DeviceType, record: &DecodedRecord) -> CodecError {
    CodecError::DeviceTypeMismatch {
        expected,
        found: record.device_type(),
    }
}

/// Split a compact payload into `(key, values)` segments.
///
/// Keys are resolved against `known`, so every returned key is one of the
/// codec's static names. Values are checked for exact arity.
pub(crate) fn segments<'a>(
    payload: &'a str,
    known: &'static [&'static str],
    arity: usize,
) -> impl Iterator<Item = DecodeResult<(&'static str, Vec<&'a str>)>> + 'a {
    payload.split(';').map(move |segment| {
        let mut tokens = segment.split(':');
        let raw_key = tokens.next().unwrap_or_default();
        let key = known
            .iter()
            .copied()
            .find(|k| *k == raw_key)
            .ok_or_else(|| DecodeError::UnknownKey(raw_key.to_string()))?;
        let values: Vec<&str> = tokens.collect();
        if values.len() != arity {
            return Err(DecodeError::Arity {
                key,
                expected: arity + 1,
                found: values.len() + 1,
            });
        }
        Ok((key, values))
    })
}

/// Store a decoded value, rejecting a second occurrence of the same key.
pub(crate) fn fill<T>(slot: &mut Option<T>, key: &'static str, value: T) -> DecodeResult<()> {
    if slot.is_some() {
        return Err(DecodeError::DuplicateKey(key));
    }
    *slot = Some(value);
    Ok(())
}

pub(crate) fn take<T>(slot: Option<T>, key: &'static str) -> DecodeResult<T> {
    slot.ok_or(DecodeError::MissingKey(key))
}

pub(crate) fn decode_float(key: &'static str, token: &str) -> DecodeResult<f32> {
    wire::float_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn decode_int(key: &'static str, token: &str) -> DecodeResult<i32> {
    wire::int_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn decode_bool(key: &'static str, token: &str) -> DecodeResult<bool> {
    wire::bool_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn decode_severity(key: &'static str, token: &str) -> DecodeResult<SeverityLevel> {
    match wire::severity_token(token) {
        SeverityToken::Valid(level) => Ok(level),
        SeverityToken::OutOfRange(value) => Err(DecodeError::InvalidSeverity { key, value }),
        SeverityToken::NotANumber => Err(invalid(key, token)),
    }
}

fn invalid(key: &'static str, token: &str) -> DecodeError {
    DecodeError::InvalidValue {
        key,
        token: token.to_string(),
    }
}
