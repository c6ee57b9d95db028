//! Tokenizer for the text telemetry format devices publish.
//!
//! A message looks like:
//!
//! ```text
//! 1;client-7;240AC4A1B2C3;relay:1:30;sensor:45.5:0:22.1:0:1200:0:6.5:0:40:0:30:0:20:0
//! ```
//!
//! The first three `;`-separated tokens are positional (version, client id,
//! fuse id). Every following token is a field `key:value[:value...]`. Fields
//! are order-independent, the last occurrence of a repeated key wins and keys
//! a codec does not ask for are ignored.

use sensorhub_types::{ParseError, ParseResult, SeverityLevel};

/// A tokenized wire message, borrowing from the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage<'a> {
    version: u32,
    client_id: &'a str,
    fuse_id: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> WireMessage<'a> {
    /// Split a raw message into its header and fields.
    ///
    /// Surrounding whitespace (including a trailing newline from serial
    /// bridges) is ignored.
    pub fn tokenize(text: &'a str) -> ParseResult<Self> {
        let mut tokens = text.trim().split(';');

        let version_token = tokens
            .next()
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingToken("version"))?;
        let version = version_token
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidVersion(version_token.to_string()))?;

        let client_id = tokens.next().ok_or(ParseError::MissingToken("client id"))?;
        let fuse_id = tokens
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingToken("fuse id"))?;

        let fields = tokens.filter(|t| !t.trim().is_empty()).collect();

        Ok(Self {
            version,
            client_id,
            fuse_id,
            fields,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn client_id(&self) -> &'a str {
        self.client_id
    }

    pub fn fuse_id(&self) -> &'a str {
        self.fuse_id
    }

    /// Values of the last field named `key`, if any.
    pub fn field(&self, key: &str) -> Option<Vec<&'a str>> {
        self.fields.iter().rev().copied().find_map(|field| {
            let mut parts = field.split(':');
            (parts.next().map(str::trim) == Some(key)).then(|| parts.map(str::trim).collect())
        })
    }

    /// Values of a required field, checked for arity.
    pub fn required_field(&self, key: &'static str, arity: usize) -> ParseResult<Vec<&'a str>> {
        let values = self.field(key).ok_or(ParseError::MissingField(key))?;
        if values.len() != arity {
            return Err(ParseError::Arity {
                key,
                expected: arity,
                found: values.len(),
            });
        }
        Ok(values)
    }
}

/// Parse a finite float.
pub(crate) fn float_token(token: &str) -> Option<f32> {
    token.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

pub(crate) fn int_token(token: &str) -> Option<i32> {
    token.trim().parse::<i32>().ok()
}

/// Parse a boolean the way device firmware prints it.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn bool_token(token: &str) -> Option<bool> {
    match token.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Result of reading a severity ordinal token.
pub(crate) enum SeverityToken {
    Valid(SeverityLevel),
    OutOfRange(i64),
    NotANumber,
}

pub(crate) fn severity_token(token: &str) -> SeverityToken {
    match token.trim().parse::<i64>() {
        Ok(value) => match SeverityLevel::try_from(value) {
            Ok(level) => SeverityToken::Valid(level),
            Err(_) => SeverityToken::OutOfRange(value),
        },
        Err(_) => SeverityToken::NotANumber,
    }
}

pub(crate) fn parse_float(key: &'static str, token: &str) -> ParseResult<f32> {
    float_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn parse_int(key: &'static str, token: &str) -> ParseResult<i32> {
    int_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn parse_bool(key: &'static str, token: &str) -> ParseResult<bool> {
    bool_token(token).ok_or_else(|| invalid(key, token))
}

pub(crate) fn parse_severity(key: &'static str, token: &str) -> ParseResult<SeverityLevel> {
    match severity_token(token) {
        SeverityToken::Valid(level) => Ok(level),
        SeverityToken::OutOfRange(value) => Err(ParseError::InvalidSeverity { key, value }),
        SeverityToken::NotANumber => Err(invalid(key, token)),
    }
}

fn invalid(key: &'static str, token: &str) -> ParseError {
    ParseError::InvalidValue {
        key,
        token: token.to_string(),
    }
}
