//! REST API endpoints for the sensorhub service.
//!
//! # Concurrency and Lock Acquisition
//!
//! - **`state.config`** (RwLock): read lock only, for the status endpoint.
//! - **`state.store`** (Mutex): held for the database queries of one request and
//!   released before payloads are decoded and aggregated.
//!
//! When both are needed, `config` is acquired first.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Query
//! parameters are validated before the store is touched; store errors return
//! HTTP 500.
//!
//! # Example
//!
//! ```ignore
//! use sensorhub_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use sensorhub_core::{EncodedSample, MAX_BUCKETS, SensorSeries, bucket_count, build_series};
use sensorhub_store::StoredDevice;
use sensorhub_types::DeviceType;

use crate::state::{AppState, IngestStatsSnapshot};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Data endpoints
        .route("/sensor/data", get(get_sensor_data))
        .route("/sensors", get(get_sensors))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub mqtt: MqttStatus,
    pub ingest: IngestStatsSnapshot,
    pub device_count: usize,
    pub reading_count: u64,
    pub codecs: Vec<CodecVersions>,
}

/// MQTT subscriber status.
#[derive(Debug, Serialize)]
pub struct MqttStatus {
    pub enabled: bool,
    pub connected: bool,
    pub broker: String,
    pub topics: Vec<TopicRoute>,
}

/// A subscribed topic and the device type publishing on it.
#[derive(Debug, Serialize)]
pub struct TopicRoute {
    pub topic: String,
    pub device_type: DeviceType,
}

/// Payload versions a device type can be read and written with.
#[derive(Debug, Serialize)]
pub struct CodecVersions {
    pub device_type: DeviceType,
    pub versions: Vec<u32>,
}

/// Get ingestion and subscriber status.
async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let (enabled, broker) = {
        let config = state.config.read().await;
        (config.mqtt.enabled, config.mqtt.broker.clone())
    };

    let (device_count, reading_count) = {
        let store = state.store.lock().await;
        (store.list_devices()?.len(), store.count_readings(None)?)
    };

    let topics = state
        .topics
        .routes()
        .into_iter()
        .map(|(topic, device_type)| TopicRoute { topic, device_type })
        .collect();

    let codecs = DeviceType::ALL
        .iter()
        .map(|&device_type| CodecVersions {
            device_type,
            versions: state.registry.versions(device_type),
        })
        .collect();

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        mqtt: MqttStatus {
            enabled,
            connected: state.mqtt.is_connected(),
            broker,
            topics,
        },
        ingest: state.stats.snapshot(),
        device_count,
        reading_count,
        codecs,
    }))
}

/// Query parameters for `/sensors`.
#[derive(Debug, Deserialize, Default)]
pub struct SensorsQuery {
    /// Comma-separated fuse ids.
    pub ids: Option<String>,
}

/// Get the devices with the given fuse ids.
///
/// Unknown ids are left out of the result.
async fn get_sensors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SensorsQuery>,
) -> Result<Json<Vec<StoredDevice>>, AppError> {
    let ids: Vec<&str> = query
        .ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    if ids.is_empty() {
        return Err(AppError::BadRequest("No fuse IDs provided".to_string()));
    }

    let store = state.store.lock().await;
    Ok(Json(store.get_devices_by_fuse_ids(&ids)?))
}

/// Query parameters for `/sensor/data`.
#[derive(Debug, Deserialize, Default)]
pub struct SensorDataQuery {
    pub fuse_id: Option<String>,
    /// RFC 3339 or unix seconds, inclusive.
    pub start: Option<String>,
    /// RFC 3339 or unix seconds, exclusive.
    pub end: Option<String>,
    /// Bucket width, 0 for raw readings.
    pub interval_ms: Option<u64>,
}

/// Validated `/sensor/data` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDataRequest {
    pub fuse_id: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub interval_ms: u64,
}

impl SensorDataQuery {
    /// Check the parameters without touching the store.
    pub fn validate(&self) -> Result<SensorDataRequest, AppError> {
        let fuse_id = self
            .fuse_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("fuse_id is required".to_string()))?;

        let start = parse_timestamp("start", self.start.as_deref())?;
        let end = parse_timestamp("end", self.end.as_deref())?;
        if start >= end {
            return Err(AppError::BadRequest(
                "Start time must be before end time".to_string(),
            ));
        }

        let interval_ms = self.interval_ms.unwrap_or(0);
        let buckets = bucket_count(start, end, interval_ms);
        if buckets > MAX_BUCKETS {
            return Err(AppError::BadRequest(format!(
                "Range spans {} buckets, limit is {}",
                buckets, MAX_BUCKETS
            )));
        }

        Ok(SensorDataRequest {
            fuse_id: fuse_id.to_string(),
            start,
            end,
            interval_ms,
        })
    }
}

/// Parse an RFC 3339 timestamp or unix seconds.
fn parse_timestamp(name: &str, value: Option<&str>) -> Result<OffsetDateTime, AppError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", name)))?;

    if let Ok(time) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(time);
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid {} time '{}': use RFC 3339 or unix seconds",
                name, value
            ))
        })
}

/// Get the decoded, optionally aggregated readings of one device.
///
/// Stored rows that can no longer be decoded are skipped.
async fn get_sensor_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SensorDataQuery>,
) -> Result<Json<SensorSeries>, AppError> {
    let request = query.validate()?;

    let (device_type, rows) = {
        let store = state.store.lock().await;
        let device = store
            .get_device_by_fuse_id(&request.fuse_id)?
            .ok_or_else(|| AppError::NotFound(format!("Device not found: {}", request.fuse_id)))?;
        let device_type = device.device_type.ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unsupported device type for device {}",
                request.fuse_id
            ))
        })?;
        (
            device_type,
            store.query_range(device.id, request.start, request.end)?,
        )
    };

    let samples: Vec<EncodedSample<'_>> = rows
        .iter()
        .map(|row| EncodedSample {
            timestamp: row.created_at,
            payload_version: row.payload_version,
            payload: &row.payload,
        })
        .collect();

    let outcome = build_series(
        &state.registry,
        device_type,
        &samples,
        request.start,
        request.interval_ms,
    );
    if outcome.skipped > 0 {
        warn!(
            "Skipped {} of {} stored readings for {}",
            outcome.skipped,
            rows.len(),
            request.fuse_id
        );
    }

    Ok(Json(outcome.series))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Store(sensorhub_store::Error),
}

impl From<sensorhub_store::Error> for AppError {
    fn from(e: sensorhub_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use sensorhub_store::{NewDevice, NewReading, Store};
    use time::Duration;
    use tower::ServiceExt;

    use crate::config::Config;

    const BASE_SECS: i64 = 1_700_000_000;

    fn create_test_state() -> Arc<AppState> {
        let store = Store::open_in_memory().unwrap();
        AppState::new(store, Config::default())
    }

    fn base_time() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(BASE_SECS).unwrap()
    }

    fn hydroponic_payload(temperature: f32) -> String {
        format!(
            "T:{:.2}:0;M:45.50:0;pH:6.50:0;C:1200:0;N:40:0;P:30:0;K:20:0;R:true:30",
            temperature
        )
    }

    /// Register a hydroponic manager with readings at t=0s, 30s and 90s.
    async fn seed_hydroponic(state: &AppState) {
        let store = state.store.lock().await;
        let device = store
            .get_or_create_device(&NewDevice::with_defaults(
                "HYDRO1",
                DeviceType::HydroponicManager,
            ))
            .unwrap();

        for (offset, temperature) in [(0, 20.0), (30, 22.0), (90, 26.0)] {
            let payload = hydroponic_payload(temperature);
            store
                .insert_reading(&NewReading {
                    device_id: device.id,
                    topic_id: 0,
                    payload_version: 1,
                    payload: &payload,
                    created_at: base_time() + Duration::seconds(offset),
                })
                .unwrap();
        }
    }

    async fn fetch(state: &Arc<AppState>, uri: &str) -> axum::response::Response {
        router()
            .with_state(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        serde_json::from_str(&response_body(response).await).unwrap()
    }

    fn data_uri(fuse_id: &str, start: i64, end: i64, interval_ms: u64) -> String {
        format!(
            "/sensor/data?fuse_id={}&start={}&end={}&interval_ms={}",
            fuse_id, start, end, interval_ms
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = create_test_state();
        let response = fetch(&state, "/api/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state();
        seed_hydroponic(&state).await;
        state.stats.record_received();

        let response = fetch(&state, "/api/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["device_count"], 1);
        assert_eq!(json["reading_count"], 3);
        assert_eq!(json["ingest"]["received"], 1);
        assert_eq!(json["mqtt"]["enabled"], true);
        assert_eq!(json["mqtt"]["connected"], false);
        assert_eq!(json["mqtt"]["topics"].as_array().unwrap().len(), 2);
        assert_eq!(json["mqtt"]["topics"][0]["topic"], "hydroponic-manager/sensors");
        assert_eq!(json["mqtt"]["topics"][0]["device_type"], "hydroponic-manager");
        assert_eq!(json["codecs"][0]["versions"], serde_json::json!([1]));
    }

    #[tokio::test]
    async fn test_sensor_data_raw_readings() {
        let state = create_test_state();
        seed_hydroponic(&state).await;

        let response = fetch(&state, &data_uri("HYDRO1", BASE_SECS, BASE_SECS + 120, 0)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["temperature"], 20.0);
        assert_eq!(points[2]["temperature"], 26.0);
        assert_eq!(points[0]["payloadVersion"], 1);
        assert_eq!(points[0]["isOn"], true);
        assert_eq!(points[0]["timestamp"], "2023-11-14T22:13:20Z");
    }

    #[tokio::test]
    async fn test_sensor_data_aggregated_drops_trailing_bucket() {
        let state = create_test_state();
        seed_hydroponic(&state).await;

        let response = fetch(
            &state,
            &data_uri("HYDRO1", BASE_SECS, BASE_SECS + 120, 60_000),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["temperature"], 21.0);
        assert_eq!(points[0]["temperatureSeverity"], 0);
    }

    #[tokio::test]
    async fn test_sensor_data_rfc3339_range() {
        let state = create_test_state();
        seed_hydroponic(&state).await;

        // Half-open: the reading at 22:13:50 is excluded
        let response = fetch(
            &state,
            "/sensor/data?fuse_id=HYDRO1&start=2023-11-14T22:13:20Z&end=2023-11-14T22:13:50Z",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sensor_data_empty_range() {
        let state = create_test_state();
        seed_hydroponic(&state).await;

        let uri = data_uri("HYDRO1", BASE_SECS + 3600, BASE_SECS + 7200, 0);
        let response = fetch(&state, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "[]");
    }

    #[tokio::test]
    async fn test_sensor_data_skips_corrupt_rows() {
        let state = create_test_state();
        {
            let store = state.store.lock().await;
            let device = store
                .get_or_create_device(&NewDevice::with_defaults(
                    "WATER1",
                    DeviceType::WaterLevelMeter,
                ))
                .unwrap();
            for (offset, version, payload) in [
                (0, 1, "wl:10.00"),
                (1, 1, "wl:not-a-number"),
                (2, 9, "wl:12.00"),
                (3, 1, "wl:14.00"),
            ] {
                store
                    .insert_reading(&NewReading {
                        device_id: device.id,
                        topic_id: 1,
                        payload_version: version,
                        payload,
                        created_at: base_time() + Duration::seconds(offset),
                    })
                    .unwrap();
            }
        }

        let response = fetch(&state, &data_uri("WATER1", BASE_SECS, BASE_SECS + 60, 0)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["average_water_level_cm"], 10.0);
        assert_eq!(points[1]["average_water_level_cm"], 14.0);
    }

    #[tokio::test]
    async fn test_sensor_data_unknown_device() {
        let state = create_test_state();
        let response = fetch(&state, &data_uri("NOPE", BASE_SECS, BASE_SECS + 60, 0)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Device not found: NOPE");
    }

    #[tokio::test]
    async fn test_sensor_data_bad_parameters() {
        let state = create_test_state();
        seed_hydroponic(&state).await;

        let bad = [
            "/sensor/data?start=1700000000&end=1700000060",
            "/sensor/data?fuse_id=HYDRO1&start=yesterday&end=1700000060",
            "/sensor/data?fuse_id=HYDRO1&start=1700000000",
            "/sensor/data?fuse_id=HYDRO1&start=1700000060&end=1700000060",
            "/sensor/data?fuse_id=HYDRO1&start=1700000060&end=1700000000",
            "/sensor/data?fuse_id=HYDRO1&start=0&end=1700000000&interval_ms=1",
            "/sensor/data?fuse_id=HYDRO1&start=1700000000&end=1700000060&interval_ms=-5",
        ];

        for uri in bad {
            let response = fetch(&state, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_sensor_data_unknown_device_type() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("data.db");
        let store = Store::open(&db_path).unwrap();
        store
            .get_or_create_device(&NewDevice::with_defaults(
                "ODD1",
                DeviceType::WaterLevelMeter,
            ))
            .unwrap();

        // Rows written by another tool may carry a type this service has no codec for
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute(
                "UPDATE devices SET device_type = 'weather-station' WHERE fuse_id = 'ODD1'",
                [],
            )
            .unwrap();

        let state = AppState::new(store, Config::default());
        let response = fetch(&state, &data_uri("ODD1", BASE_SECS, BASE_SECS + 60, 0)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_sensors_by_ids() {
        let state = create_test_state();
        seed_hydroponic(&state).await;
        {
            let store = state.store.lock().await;
            store
                .get_or_create_device(&NewDevice::with_defaults(
                    "WATER1",
                    DeviceType::WaterLevelMeter,
                ))
                .unwrap();
        }

        let response = fetch(&state, "/sensors?ids=HYDRO1,%20WATER1,MISSING").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let devices = json.as_array().unwrap();
        assert_eq!(devices.len(), 2);
        let mut fuse_ids: Vec<&str> = devices
            .iter()
            .map(|d| d["fuse_id"].as_str().unwrap())
            .collect();
        fuse_ids.sort();
        assert_eq!(fuse_ids, vec!["HYDRO1", "WATER1"]);

        let water = devices.iter().find(|d| d["fuse_id"] == "WATER1").unwrap();
        assert_eq!(water["type"], "water-level-meter");
        assert_eq!(water["wifi_strength"], 0);
        assert_eq!(water["battery_percent"], 0);
        assert!(water["last_seen"].is_string());
        assert!(water["created_at"].is_string());
        assert!(water.get("fuseId").is_none());
    }

    #[tokio::test]
    async fn test_get_sensors_requires_ids() {
        let state = create_test_state();

        for uri in ["/sensors", "/sensors?ids=", "/sensors?ids=,,"] {
            let response = fetch(&state, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let json = response_json(response).await;
            assert_eq!(json["error"], "No fuse IDs provided");
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("start", Some("2023-11-14T22:13:20Z")).unwrap();
        let unix = parse_timestamp("start", Some("1700000000")).unwrap();
        assert_eq!(rfc, unix);

        let offset = parse_timestamp("start", Some("2023-11-14T23:13:20+01:00")).unwrap();
        assert_eq!(offset, unix);

        assert!(parse_timestamp("start", None).is_err());
        assert!(parse_timestamp("start", Some("  ")).is_err());
        assert!(parse_timestamp("start", Some("2023-11-14")).is_err());
    }

    #[test]
    fn test_sensor_data_query_validate() {
        let query = SensorDataQuery {
            fuse_id: Some("F00D".to_string()),
            start: Some("1700000000".to_string()),
            end: Some("1700003600".to_string()),
            interval_ms: None,
        };
        let request = query.validate().unwrap();
        assert_eq!(request.fuse_id, "F00D");
        assert_eq!(request.interval_ms, 0);
        assert_eq!(request.end - request.start, Duration::hours(1));
    }

    #[test]
    fn test_app_error_status_codes() {
        let response = AppError::NotFound("x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::BadRequest("x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err = sensorhub_store::Error::DeviceNotFound("x".to_string());
        let response = AppError::Store(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
