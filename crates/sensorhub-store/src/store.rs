//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use sensorhub_types::{DeviceType, MAX_COMPACT_PAYLOAD_LEN};

use crate::error::{Error, Result};
use crate::models::{NewDevice, NewReading, StoredDevice, StoredReading};
use crate::queries::ReadingQuery;
use crate::schema;

const DEVICE_COLUMNS: &str = "id, fuse_id, name, description, location, device_type, \
     wifi_strength, battery_percent, last_seen, created_at";

/// SQLite-based store for devices and their telemetry.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // === Device operations ===

    /// Return the device with this fuse id, registering it first if unseen.
    ///
    /// An existing device is returned unchanged; `device` only supplies the
    /// values of a new row.
    pub fn get_or_create_device(&self, device: &NewDevice) -> Result<StoredDevice> {
        let now = unix_millis(OffsetDateTime::now_utc());

        let inserted = self.conn.execute(
            "INSERT INTO devices (fuse_id, name, description, location, device_type,
                                  wifi_strength, battery_percent, last_seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?6)
             ON CONFLICT(fuse_id) DO NOTHING",
            rusqlite::params![
                device.fuse_id,
                device.name,
                device.description,
                device.location,
                device.device_type.as_str(),
                now
            ],
        )?;
        if inserted > 0 {
            info!(
                "Registered new {} device {}",
                device.device_type, device.fuse_id
            );
        }

        self.get_device_by_fuse_id(&device.fuse_id)?
            .ok_or_else(|| Error::DeviceNotFound(device.fuse_id.clone()))
    }

    /// Get a device by fuse id.
    pub fn get_device_by_fuse_id(&self, fuse_id: &str) -> Result<Option<StoredDevice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE fuse_id = ?"
        ))?;

        let device = stmt.query_row([fuse_id], device_from_row).optional()?;

        Ok(device)
    }

    /// Get every known device among `fuse_ids`. Unknown ids are left out.
    pub fn get_devices_by_fuse_ids<S: AsRef<str>>(
        &self,
        fuse_ids: &[S],
    ) -> Result<Vec<StoredDevice>> {
        if fuse_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = fuse_ids.iter().map(|s| s.as_ref()).collect();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE fuse_id IN ({placeholders}) ORDER BY id"
        ))?;

        let devices = stmt
            .query_map(rusqlite::params_from_iter(ids), device_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(devices)
    }

    /// List all devices.
    pub fn list_devices(&self) -> Result<Vec<StoredDevice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY last_seen DESC"
        ))?;

        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(devices)
    }
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<StoredDevice> {
    Ok(StoredDevice {
        id: row.get(0)?,
        fuse_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        device_type: row
            .get::<_, String>(5)?
            .parse::<DeviceType>()
            .ok(),
        wifi_strength: row.get(6)?,
        battery_percent: row.get(7)?,
        last_seen: from_millis(8, row.get(8)?)?,
        created_at: from_millis(9, row.get(9)?)?,
    })
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReading> {
    Ok(StoredReading {
        id: row.get(0)?,
        device_id: row.get(1)?,
        topic_id: row.get(2)?,
        payload_version: row.get(3)?,
        payload: row.get(4)?,
        created_at: from_millis(5, row.get(5)?)?,
    })
}

/// Milliseconds since the unix epoch.
pub(crate) fn unix_millis(time: OffsetDateTime) -> i64 {
    (time.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(column: usize, millis: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}

// Reading operations
impl Store {
    /// Append a reading and bump the device's `last_seen`.
    ///
    /// Both writes happen in one transaction.
    pub fn insert_reading(&self, reading: &NewReading<'_>) -> Result<i64> {
        if reading.payload.len() > MAX_COMPACT_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: reading.payload.len(),
                max: MAX_COMPACT_PAYLOAD_LEN,
            });
        }

        let created_at = unix_millis(reading.created_at);
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO sensor_readings (device_id, topic_id, payload_version, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                reading.device_id,
                reading.topic_id,
                reading.payload_version,
                reading.payload,
                created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE devices SET last_seen = MAX(last_seen, ?2) WHERE id = ?1",
            rusqlite::params![reading.device_id, created_at],
        )?;

        tx.commit()?;
        Ok(id)
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(rusqlite::params_from_iter(params), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Readings of one device in `[start, end)`, oldest first.
    pub fn query_range(
        &self,
        device_id: i64,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<StoredReading>> {
        let query = ReadingQuery::new()
            .device(device_id)
            .since(start)
            .before(end)
            .oldest_first();
        self.query_readings(&query)
    }

    /// Count readings, optionally for one device.
    pub fn count_readings(&self, device_id: Option<i64>) -> Result<u64> {
        let count: i64 = match device_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM sensor_readings WHERE device_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => {
                self.conn
                    .query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?
            }
        };
        Ok(count as u64)
    }
}
