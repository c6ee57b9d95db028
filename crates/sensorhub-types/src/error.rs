//! Error types for wire parsing and storage decoding.

use thiserror::Error;

/// Errors produced while parsing a raw telemetry message from a device.
///
/// A message that fails to parse is never partially applied: the caller
/// either gets a complete record or one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The message ended before a positional header token.
    #[error("Missing {0} token")]
    MissingToken(&'static str),

    /// The version token is not an unsigned integer.
    #[error("Invalid payload version: {0:?}")]
    InvalidVersion(String),

    /// A field required by this payload version is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field carries the wrong number of values.
    #[error("Field {key} expects {expected} values, got {found}")]
    Arity {
        key: &'static str,
        expected: usize,
        found: usize,
    },

    /// A value could not be parsed as the expected type.
    #[error("Invalid value for {key}: {token:?}")]
    InvalidValue { key: &'static str, token: String },

    /// A severity ordinal outside `0..=2`.
    #[error("Invalid severity for {key}: {value}")]
    InvalidSeverity { key: &'static str, value: i64 },
}

/// Errors produced while decoding a compact payload read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A key this decoder does not know about.
    #[error("Unknown key: {0:?}")]
    UnknownKey(String),

    /// A key appears more than once.
    #[error("Duplicate key: {0}")]
    DuplicateKey(&'static str),

    /// A key the encoder always writes is absent.
    #[error("Missing key: {0}")]
    MissingKey(&'static str),

    /// A segment has the wrong number of `:`-separated tokens.
    #[error("Key {key} expects {expected} tokens, got {found}")]
    Arity {
        key: &'static str,
        expected: usize,
        found: usize,
    },

    /// A token could not be parsed as the expected type.
    #[error("Invalid value for {key}: {token:?}")]
    InvalidValue { key: &'static str, token: String },

    /// A severity ordinal outside `0..=2`.
    #[error("Invalid severity for {key}: {value}")]
    InvalidSeverity { key: &'static str, value: i64 },
}

/// Result type alias for wire parsing.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Result type alias for storage decoding.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// A severity ordinal outside `0..=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid severity ordinal: {0}")]
pub struct InvalidSeverity(pub i64);

/// A device type name that is not one of the known device types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown device type: {0:?}")]
pub struct UnknownDeviceType(pub String);
