//! Ingestion pipeline: wire message in, compact row out.
//!
//! Each inbound message goes through
//!
//! 1. UTF-8 validation
//! 2. [`CodecRegistry::parse_message`](sensorhub_core::CodecRegistry::parse_message)
//! 3. [`CodecRegistry::encode`](sensorhub_core::CodecRegistry::encode)
//! 4. [`Store::get_or_create_device`](sensorhub_store::Store::get_or_create_device)
//! 5. [`Store::insert_reading`](sensorhub_store::Store::insert_reading)
//!
//! A fuse id already registered under another device type is rejected after
//! step 4. Any failure rejects the message and nothing of it is written,
//! except the device row when the failure happens in step 5. Messages are never retried.

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use sensorhub_core::CodecError;
use sensorhub_store::{NewDevice, NewReading};
use sensorhub_types::DeviceType;

use crate::state::{AppState, RejectKind};

/// Errors that reject an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Device {fuse_id} is registered as {}, not {received}", registered_name(.registered))]
    DeviceTypeConflict {
        fuse_id: String,
        /// Type of the existing device row, `None` if unknown to this service.
        registered: Option<DeviceType>,
        received: DeviceType,
    },

    #[error("Store error: {0}")]
    Store(#[from] sensorhub_store::Error),
}

impl IngestError {
    /// Counter this rejection is recorded under.
    pub fn kind(&self) -> RejectKind {
        match self {
            IngestError::InvalidUtf8(_) => RejectKind::Malformed,
            IngestError::Codec(CodecError::PayloadTooLarge { .. }) => RejectKind::Oversized,
            IngestError::Codec(CodecError::UnsupportedVersion { .. }) => RejectKind::Unsupported,
            IngestError::Codec(_) => RejectKind::Malformed,
            IngestError::DeviceTypeConflict { .. } => RejectKind::Conflict,
            IngestError::Store(sensorhub_store::Error::PayloadTooLarge { .. }) => {
                RejectKind::Oversized
            }
            IngestError::Store(_) => RejectKind::Store,
        }
    }
}

fn registered_name(registered: &Option<DeviceType>) -> String {
    registered.map_or_else(|| "an unknown type".to_string(), |t| t.to_string())
}

/// A message that was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Database row ID of the device.
    pub device_id: i64,
    /// Database row ID of the reading.
    pub reading_id: i64,
    pub fuse_id: String,
    pub payload_version: u32,
}

/// Parse, encode and store one message from a device of `device_type`.
///
/// Updates the ingestion counters in `state` whatever the result.
pub async fn ingest(
    state: &AppState,
    device_type: DeviceType,
    payload: &[u8],
) -> Result<IngestOutcome, IngestError> {
    state.stats.record_received();
    match store_message(state, device_type, payload).await {
        Ok(outcome) => {
            state.stats.record_stored();
            Ok(outcome)
        }
        Err(e) => {
            state.stats.record_rejected(e.kind());
            Err(e)
        }
    }
}

async fn store_message(
    state: &AppState,
    device_type: DeviceType,
    payload: &[u8],
) -> Result<IngestOutcome, IngestError> {
    let text = std::str::from_utf8(payload)?;
    let parsed = state.registry.parse_message(device_type, text)?;
    let compact = state.registry.encode(parsed.version, &parsed.record)?;

    let store = state.store.lock().await;
    let device = store.get_or_create_device(&NewDevice::with_defaults(
        parsed.fuse_id.as_str(),
        device_type,
    ))?;
    if device.device_type != Some(device_type) {
        return Err(IngestError::DeviceTypeConflict {
            fuse_id: parsed.fuse_id,
            registered: device.device_type,
            received: device_type,
        });
    }
    let reading_id = store.insert_reading(&NewReading {
        device_id: device.id,
        topic_id: device_type.topic_id(),
        payload_version: parsed.version,
        payload: &compact,
        created_at: OffsetDateTime::now_utc(),
    })?;

    debug!(
        "Stored v{} {} reading {} for {} ({} bytes)",
        parsed.version,
        device_type,
        reading_id,
        parsed.fuse_id,
        compact.len()
    );

    Ok(IngestOutcome {
        device_id: device.id,
        reading_id,
        fuse_id: parsed.fuse_id,
        payload_version: parsed.version,
    })
}

/// Route a message received on `topic` and ingest it.
///
/// Messages on topics without a route are ignored. Rejected messages are
/// logged and dropped.
pub async fn handle_publish(state: &AppState, topic: &str, payload: &[u8]) {
    let Some(device_type) = state.topics.resolve(topic) else {
        debug!("Ignoring message on unrouted topic {}", topic);
        return;
    };

    match ingest(state, device_type, payload).await {
        Ok(outcome) => info!(
            "Stored reading {} from {} on {}",
            outcome.reading_id, outcome.fuse_id, topic
        ),
        Err(e) => warn!("Dropping message on {}: {}", topic, e),
    }
}
