//! Decode stored payloads and aggregate them into a series.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use sensorhub_types::{DecodedRecord, DeviceType, HydroponicReading, WaterLevelReading};

use crate::aggregate::{Aggregate, DataPoint, Sample, aggregate};
use crate::registry::CodecRegistry;

/// A stored payload as read back from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedSample<'a> {
    pub timestamp: OffsetDateTime,
    pub payload_version: u32,
    pub payload: &'a str,
}

/// An aggregated series for one device.
///
/// Serializes as a bare JSON array of points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorSeries {
    Hydroponic(Vec<DataPoint<HydroponicReading>>),
    WaterLevel(Vec<DataPoint<WaterLevelReading>>),
}

impl SensorSeries {
    pub fn len(&self) -> usize {
        match self {
            SensorSeries::Hydroponic(points) => points.len(),
            SensorSeries::WaterLevel(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`build_series`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOutcome {
    pub series: SensorSeries,
    /// Rows that could not be decoded and were left out.
    pub skipped: usize,
}

/// Decode `rows` with the codec for each row's own version, then aggregate.
///
/// A row that fails to decode is logged and skipped; the remaining rows are
/// still returned.
pub fn build_series(
    registry: &CodecRegistry,
    device_type: DeviceType,
    rows: &[EncodedSample<'_>],
    start: OffsetDateTime,
    interval_ms: u64,
) -> SeriesOutcome {
    let mut skipped = 0;
    let series = match device_type {
        DeviceType::HydroponicManager => SensorSeries::Hydroponic(decode_and_aggregate(
            registry,
            device_type,
            rows,
            start,
            interval_ms,
            &mut skipped,
        )),
        DeviceType::WaterLevelMeter => SensorSeries::WaterLevel(decode_and_aggregate(
            registry,
            device_type,
            rows,
            start,
            interval_ms,
            &mut skipped,
        )),
    };

    SeriesOutcome { series, skipped }
}

fn decode_and_aggregate<R>(
    registry: &CodecRegistry,
    device_type: DeviceType,
    rows: &[EncodedSample<'_>],
    start: OffsetDateTime,
    interval_ms: u64,
    skipped: &mut usize,
) -> Vec<DataPoint<R>>
where
    R: Aggregate + TryFrom<DecodedRecord, Error = DeviceType>,
{
    let mut samples = Vec::with_capacity(rows.len());

    for row in rows {
        let decoded = registry
            .decode(device_type, row.payload_version, row.payload)
            .map(R::try_from);
        match decoded {
            Ok(Ok(reading)) => samples.push(Sample {
                timestamp: row.timestamp,
                payload_version: row.payload_version,
                reading,
            }),
            Ok(Err(found)) => {
                warn!(
                    "Skipping row at {}: decoded a {} record for a {} device",
                    row.timestamp, found, device_type
                );
                *skipped += 1;
            }
            Err(e) => {
                warn!(
                    "Skipping undecodable row at {} (version {}): {}",
                    row.timestamp, row.payload_version, e
                );
                *skipped += 1;
            }
        }
    }

    aggregate(&samples, start, interval_ms)
}
