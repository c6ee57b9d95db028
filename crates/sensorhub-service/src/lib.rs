//! MQTT ingestion and HTTP query API for sensorhub devices.
//!
//! This crate provides a service that:
//! - Subscribes to device telemetry topics on an MQTT broker
//! - Re-encodes each message into its compact form and stores it
//! - Registers devices on their first message
//! - Serves decoded, time-bucketed readings over a REST API
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Ingestion counters, MQTT state and codec versions
//! - `GET /sensor/data?fuse_id=..&start=..&end=..&interval_ms=..` - Readings of one device
//! - `GET /sensors?ids=..` - Devices by comma-separated fuse ids
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/sensorhub/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/sensorhub/data.db"
//!
//! [mqtt]
//! enabled = true
//! broker = "mqtt://localhost:1883"
//! client_id = "sensorhub"
//! hydroponic_topic = "hydroponic-manager/sensors"
//! water_meter_topic = "water-meter/sensors"
//! ```

pub mod api;
pub mod config;
pub mod ingest;
pub mod state;

pub use config::{Config, ConfigError, MqttConfig, ServerConfig, StorageConfig};
pub use ingest::{IngestError, IngestOutcome, handle_publish, ingest};
pub use state::{AppState, IngestStats, IngestStatsSnapshot, RejectKind, TopicRouter};

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttSubscriber;
