//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};

use sensorhub_core::CodecRegistry;
use sensorhub_store::Store;
use sensorhub_types::DeviceType;

use crate::config::{Config, MqttConfig};

/// Shared application state.
pub struct AppState {
    /// Data store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration.
    pub config: RwLock<Config>,
    /// Codecs for every supported device type and payload version.
    pub registry: CodecRegistry,
    /// MQTT topic to device type table.
    pub topics: TopicRouter,
    /// Ingestion counters.
    pub stats: IngestStats,
    /// MQTT subscriber state.
    pub mqtt: MqttState,
}

impl AppState {
    /// Create new application state with the built-in codecs and the
    /// topics named in the MQTT configuration.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        Self::with_registry(store, config, CodecRegistry::builtin())
    }

    /// Create new application state with a custom codec registry.
    pub fn with_registry(store: Store, config: Config, registry: CodecRegistry) -> Arc<Self> {
        let topics = TopicRouter::from_config(&config.mqtt);
        Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            registry,
            topics,
            stats: IngestStats::default(),
            mqtt: MqttState::new(),
        })
    }
}

/// Maps MQTT topics to the device type publishing on them.
///
/// Registration and lookup may happen from different tasks at once.
#[derive(Debug, Default)]
pub struct TopicRouter {
    routes: std::sync::RwLock<HashMap<String, DeviceType>>,
}

impl TopicRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the hydroponic and water meter topics of `config`.
    pub fn from_config(config: &MqttConfig) -> Self {
        let router = Self::new();
        router.register(&config.hydroponic_topic, DeviceType::HydroponicManager);
        router.register(&config.water_meter_topic, DeviceType::WaterLevelMeter);
        router
    }

    /// Route `topic` to `device_type`, returning the previous route if any.
    pub fn register(
        &self,
        topic: impl Into<String>,
        device_type: DeviceType,
    ) -> Option<DeviceType> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.into(), device_type)
    }

    /// Device type publishing on `topic`.
    pub fn resolve(&self, topic: &str) -> Option<DeviceType> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .copied()
    }

    /// All routes, sorted by topic.
    pub fn routes(&self) -> Vec<(String, DeviceType)> {
        let mut routes: Vec<_> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(topic, device_type)| (topic.clone(), *device_type))
            .collect();
        routes.sort();
        routes
    }
}

/// Counters for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    stored: AtomicU64,
    malformed: AtomicU64,
    oversized: AtomicU64,
    unsupported: AtomicU64,
    conflicts: AtomicU64,
    store_failures: AtomicU64,
}

/// Why a message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Not UTF-8, or not a valid wire message.
    Malformed,
    /// Compact encoding above the storage limit.
    Oversized,
    /// No codec for the payload version.
    Unsupported,
    /// The fuse id is registered under another device type.
    Conflict,
    /// The store refused or failed the write.
    Store,
}

impl IngestStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, kind: RejectKind) {
        let counter = match kind {
            RejectKind::Malformed => &self.malformed,
            RejectKind::Oversized => &self.oversized,
            RejectKind::Unsupported => &self.unsupported,
            RejectKind::Conflict => &self.conflicts,
            RejectKind::Store => &self.store_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub received: u64,
    pub stored: u64,
    pub malformed: u64,
    pub oversized: u64,
    pub unsupported: u64,
    pub conflicts: u64,
    pub store_failures: u64,
}

/// State of the MQTT subscriber.
pub struct MqttState {
    connected: AtomicBool,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl MqttState {
    fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            connected: AtomicBool::new(false),
            stop_tx,
            stop_rx,
        }
    }

    /// Whether the subscriber holds a broker session.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal the subscriber to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
