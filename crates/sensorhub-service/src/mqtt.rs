//! MQTT subscriber feeding device telemetry into the ingestion pipeline.
//!
//! The subscriber holds one broker session and subscribes to every topic in
//! the [`TopicRouter`](crate::state::TopicRouter). Each received publish is
//! handed to [`ingest::handle_publish`] in its own task, so a slow or failing
//! message never holds up the event loop or its siblings.
//!
//! # Example Configuration
//!
//! ```toml
//! [mqtt]
//! enabled = true
//! broker = "mqtts://broker.example.com:8883"
//! client_id = "sensorhub"
//! username = "hub"
//! password = "secret"
//! ca_file = "/etc/sensorhub/ca.pem"
//! client_cert = "/etc/sensorhub/client.crt"
//! client_key = "/etc/sensorhub/client.key"
//! ```
//!
//! # Reconnection
//!
//! Subscriptions are (re)issued on every `ConnAck`. Connection errors are
//! logged and the event loop is polled again after a delay; telemetry sent
//! while disconnected is lost.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::tokio_native_tls::native_tls;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration, Transport,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::ingest;
use crate::state::AppState;

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 32;

/// Errors setting up the broker connection.
#[derive(Debug, thiserror::Error)]
pub enum MqttSetupError {
    #[error("Invalid MQTT broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Failed to read TLS file {path}: {source}")]
    ReadTlsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TLS settings: {0}")]
    Tls(#[from] native_tls::Error),
}

/// MQTT subscriber that forwards telemetry to the store.
pub struct MqttSubscriber {
    state: Arc<AppState>,
}

impl MqttSubscriber {
    /// Create a new MQTT subscriber.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start the subscriber in the background.
    ///
    /// Returns `None` when MQTT is disabled or the broker settings are
    /// unusable; the HTTP API keeps running either way.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let config = self.state.config.read().await.mqtt.clone();

        if !config.enabled {
            info!("MQTT subscriber is disabled");
            return None;
        }

        let options = match mqtt_options(&config) {
            Ok(options) => options,
            Err(e) => {
                error!("{}", e);
                return None;
            }
        };

        info!("Starting MQTT subscriber for {}", config.broker);

        let state = Arc::clone(&self.state);
        let stop_rx = self.state.mqtt.subscribe_stop();
        Some(tokio::spawn(run_subscriber(state, options, stop_rx)))
    }
}

/// Build client options from the configuration.
fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, MqttSetupError> {
    let (host, port, use_tls) =
        parse_broker_url(&config.broker).map_err(MqttSetupError::InvalidBrokerUrl)?;

    let mut options = MqttOptions::new(&config.client_id, host, port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive));

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }

    if use_tls {
        options.set_transport(Transport::tls_with_config(tls_configuration(config)?));
    }

    Ok(options)
}

/// TLS settings for an `mqtts://` broker.
///
/// Without a CA file or client certificate the platform defaults apply.
fn tls_configuration(config: &MqttConfig) -> Result<TlsConfiguration, MqttSetupError> {
    let identity = match (&config.client_cert, &config.client_key) {
        (Some(cert), Some(key)) => Some(native_tls::Identity::from_pkcs8(
            &read_tls_file(cert)?,
            &read_tls_file(key)?,
        )?),
        _ => None,
    };

    if config.ca_file.is_none() && identity.is_none() {
        return Ok(TlsConfiguration::Native);
    }

    let mut builder = native_tls::TlsConnector::builder();
    if let Some(path) = &config.ca_file {
        builder.add_root_certificate(native_tls::Certificate::from_pem(&read_tls_file(path)?)?);
    }
    if let Some(identity) = identity {
        builder.identity(identity);
    }
    Ok(TlsConfiguration::NativeConnector(builder.build()?))
}

fn read_tls_file(path: &Path) -> Result<Vec<u8>, MqttSetupError> {
    std::fs::read(path).map_err(|e| MqttSetupError::ReadTlsFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Run the subscriber event loop until a stop is signalled.
async fn run_subscriber(
    state: Arc<AppState>,
    options: MqttOptions,
    mut stop_rx: watch::Receiver<bool>,
) {
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT connected: {:?}", ack.code);
                    state.mqtt.set_connected(true);
                    subscribe_all(&state, &client);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        ingest::handle_publish(&state, &publish.topic, &publish.payload).await;
                    });
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("MQTT subscription {} acknowledged", ack.pkid);
                }
                Ok(_) => {}
                Err(e) => {
                    state.mqtt.set_connected(false);
                    warn!("MQTT connection error: {}. Reconnecting...", e);
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
            },
            _ = stop_rx.changed() => {}
        }

        if *stop_rx.borrow() {
            info!("MQTT subscriber received stop signal");
            break;
        }
    }

    disconnect(&client, &mut eventloop).await;
    state.mqtt.set_connected(false);
    info!("MQTT subscriber stopped");
}

fn subscribe_all(state: &AppState, client: &AsyncClient) {
    for (topic, device_type) in state.topics.routes() {
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => info!("Subscribed to {} ({})", topic, device_type),
            Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
        }
    }
}

/// Send a DISCONNECT and give the event loop a moment to flush it.
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!("Error disconnecting MQTT client: {}", e);
        return;
    }

    let flushed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if flushed.is_err() {
        debug!("Timed out flushing MQTT disconnect");
    }
}

/// Parse an MQTT broker URL into (host, port, use_tls).
fn parse_broker_url(url: &str) -> Result<(String, u16, bool), String> {
    let (use_tls, rest) = if let Some(stripped) = url.strip_prefix("mqtt://") {
        (false, stripped)
    } else if let Some(stripped) = url.strip_prefix("mqtts://") {
        (true, stripped)
    } else {
        return Err(format!(
            "'{}': URL must start with mqtt:// or mqtts://",
            url
        ));
    };

    let default_port = if use_tls { 8883 } else { 1883 };

    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) => {
            let port = p
                .parse::<u16>()
                .map_err(|_| format!("'{}': invalid port '{}'", url, p))?;
            (h.to_string(), port)
        }
        None => (rest.to_string(), default_port),
    };

    if host.is_empty() {
        return Err(format!("'{}': host cannot be empty", url));
    }

    Ok((host, port, use_tls))
}
