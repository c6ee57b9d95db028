//! Query builder for stored readings.
//!
//! # Example
//!
//! ```
//! use sensorhub_store::{ReadingQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let now = OffsetDateTime::now_utc();
//!
//! // Last hour of one device, chronological
//! let query = ReadingQuery::new()
//!     .device(1)
//!     .since(now - Duration::hours(1))
//!     .before(now)
//!     .oldest_first();
//!
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), sensorhub_store::Error>(())
//! ```

use time::OffsetDateTime;

use crate::store::unix_millis;

/// Fluent query builder for stored readings.
///
/// Use this to construct queries for [`Store::query_readings`](crate::Store::query_readings).
/// The time filter is half-open: `since` is inclusive, `before` exclusive.
///
/// By default, queries return results ordered by `created_at` descending
/// (newest first).
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by device row ID.
    pub device_id: Option<i64>,
    /// Filter readings created at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Filter readings created strictly before this time.
    pub before: Option<OffsetDateTime>,
    /// Order by created_at descending (newest first).
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No device filter (all devices)
    /// - No time range filter
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by device row ID.
    pub fn device(mut self, device_id: i64) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Filter to readings created at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings created strictly before this time.
    pub fn before(mut self, time: OffsetDateTime) -> Self {
        self.before = Some(time);
        self
    }

    /// Order results by oldest first (ascending by `created_at`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<i64>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(device_id);
        }

        if let Some(since) = self.since {
            conditions.push("created_at >= ?");
            params.push(unix_millis(since));
        }

        if let Some(before) = self.before {
            conditions.push("created_at < ?");
            params.push(unix_millis(before));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        // id breaks ties between readings stored in the same millisecond
        format!(
            "SELECT id, device_id, topic_id, payload_version, payload, created_at \
             FROM sensor_readings {} ORDER BY created_at {}, id {}",
            where_clause, order, order
        )
    }
}
