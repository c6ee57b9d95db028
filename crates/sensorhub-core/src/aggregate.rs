//! Time-bucket downsampling of decoded readings.
//!
//! [`aggregate`] walks time-ascending samples once. Buckets are
//! `interval_ms` wide and start at the query's `start`. When a sample crosses
//! a bucket boundary the bucket being closed is emitted: the mean of its
//! samples, or a zero placeholder (payload version 0) when it received none.
//! The bucket still open after the last sample is never emitted.
//!
//! With readings at 0 s, 30 s and 90 s (temperatures 20, 22, 26) and a 60 s
//! interval, the 90 s reading closes the first bucket (mean 21) and opens a
//! second one that is never closed, so exactly one point is produced.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use sensorhub_types::{
    HydroponicReading, HydroponicSensors, RelayState, SeverityLevel, WaterLevelReading,
};

/// Upper bound on the number of buckets a single query may span.
pub const MAX_BUCKETS: u64 = 100_000;

/// A decoded reading with its storage metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<R> {
    pub timestamp: OffsetDateTime,
    pub payload_version: u32,
    pub reading: R,
}

/// One output point of an aggregated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint<R> {
    /// Sample timestamp, or bucket start when aggregating.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Version of the last sample in the bucket, 0 for gap placeholders.
    pub payload_version: u32,
    #[serde(flatten)]
    pub reading: R,
}

/// A reading type that can be averaged over a bucket.
///
/// `Default` doubles as the placeholder emitted for empty buckets.
pub trait Aggregate: Copy + Default {
    /// Running sums for one bucket.
    type Accumulator: Default;

    /// Fold one sample into the bucket.
    fn accumulate(acc: &mut Self::Accumulator, reading: &Self);

    /// Produce the bucket mean. `count` is never zero.
    fn finish(acc: &Self::Accumulator, count: u32) -> Self;
}

/// Downsample `samples` into `interval_ms`-wide buckets starting at `start`.
///
/// `samples` must be sorted by timestamp. An interval of 0 returns every
/// sample as its own point.
pub fn aggregate<R: Aggregate>(
    samples: &[Sample<R>],
    start: OffsetDateTime,
    interval_ms: u64,
) -> Vec<DataPoint<R>> {
    if interval_ms == 0 {
        return samples
            .iter()
            .map(|s| DataPoint {
                timestamp: s.timestamp,
                payload_version: s.payload_version,
                reading: s.reading,
            })
            .collect();
    }

    let step = Duration::milliseconds(i64::try_from(interval_ms).unwrap_or(i64::MAX));
    let Some(mut cursor) = start.checked_add(step) else {
        return Vec::new();
    };
    let mut bucket_start = start;

    let mut points = Vec::new();
    let mut acc = R::Accumulator::default();
    let mut count: u32 = 0;
    let mut last_version = 0;

    for sample in samples {
        while sample.timestamp >= cursor {
            let point = if count > 0 {
                DataPoint {
                    timestamp: bucket_start,
                    payload_version: last_version,
                    reading: R::finish(&acc, count),
                }
            } else {
                DataPoint {
                    timestamp: bucket_start,
                    payload_version: 0,
                    reading: R::default(),
                }
            };
            points.push(point);
            acc = R::Accumulator::default();
            count = 0;

            bucket_start = cursor;
            match cursor.checked_add(step) {
                Some(next) => cursor = next,
                // No further boundary is representable; the rest is the
                // trailing bucket.
                None => return points,
            }
        }

        R::accumulate(&mut acc, &sample.reading);
        count += 1;
        last_version = sample.payload_version;
    }

    points
}

/// Number of buckets between `start` and `end` at the given interval.
pub fn bucket_count(start: OffsetDateTime, end: OffsetDateTime, interval_ms: u64) -> u64 {
    if interval_ms == 0 || end <= start {
        return 0;
    }
    let span_ms = (end - start).whole_milliseconds().max(0) as u128;
    span_ms.div_ceil(u128::from(interval_ms)).min(u128::from(u64::MAX)) as u64
}

/// Running sums for [`HydroponicReading`].
#[derive(Debug, Default)]
pub struct HydroponicAccumulator {
    temperature: f64,
    moisture: f64,
    ph: f64,
    conductivity: i64,
    nitrogen: i64,
    phosphorus: i64,
    potassium: i64,
    /// Severity ordinal sums, in field order.
    severities: [i64; 7],
    relay: RelayState,
}

fn severity_mean(sum: i64, count: u32) -> SeverityLevel {
    let mean = sum / i64::from(count);
    SeverityLevel::classify(i32::try_from(mean).unwrap_or(i32::MAX))
}

fn int_mean(sum: i64, count: u32) -> i32 {
    let mean = sum / i64::from(count);
    i32::try_from(mean).unwrap_or(if mean < 0 { i32::MIN } else { i32::MAX })
}

fn float_mean(sum: f64, count: u32) -> f32 {
    (sum / f64::from(count)) as f32
}

impl Aggregate for HydroponicReading {
    type Accumulator = HydroponicAccumulator;

    fn accumulate(acc: &mut Self::Accumulator, reading: &Self) {
        let s = &reading.sensors;
        acc.temperature += f64::from(s.temperature);
        acc.moisture += f64::from(s.moisture);
        acc.ph += f64::from(s.ph);
        acc.conductivity += i64::from(s.conductivity);
        acc.nitrogen += i64::from(s.nitrogen);
        acc.phosphorus += i64::from(s.phosphorus);
        acc.potassium += i64::from(s.potassium);

        let ordinals = [
            s.temperature_severity,
            s.moisture_severity,
            s.ph_severity,
            s.conductivity_severity,
            s.nitrogen_severity,
            s.phosphorus_severity,
            s.potassium_severity,
        ];
        for (sum, level) in acc.severities.iter_mut().zip(ordinals) {
            *sum += i64::from(level.ordinal());
        }

        // Relay state is a switch position, not a quantity.
        acc.relay = reading.relay;
    }

    fn finish(acc: &Self::Accumulator, count: u32) -> Self {
        let sev = |i: usize| severity_mean(acc.severities[i], count);
        HydroponicReading {
            sensors: HydroponicSensors {
                temperature: float_mean(acc.temperature, count),
                temperature_severity: sev(0),
                moisture: float_mean(acc.moisture, count),
                moisture_severity: sev(1),
                ph: float_mean(acc.ph, count),
                ph_severity: sev(2),
                conductivity: int_mean(acc.conductivity, count),
                conductivity_severity: sev(3),
                nitrogen: int_mean(acc.nitrogen, count),
                nitrogen_severity: sev(4),
                phosphorus: int_mean(acc.phosphorus, count),
                phosphorus_severity: sev(5),
                potassium: int_mean(acc.potassium, count),
                potassium_severity: sev(6),
            },
            relay: acc.relay,
        }
    }
}

/// Running sum for [`WaterLevelReading`].
#[derive(Debug, Default)]
pub struct WaterLevelAccumulator {
    level_cm: f64,
}

impl Aggregate for WaterLevelReading {
    type Accumulator = WaterLevelAccumulator;

    fn accumulate(acc: &mut Self::Accumulator, reading: &Self) {
        acc.level_cm += f64::from(reading.average_water_level_cm);
    }

    fn finish(acc: &Self::Accumulator, count: u32) -> Self {
        WaterLevelReading {
            average_water_level_cm: float_mean(acc.level_cm, count),
        }
    }
}
