//! Server configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Topic the hydroponic manager publishes telemetry on.
pub const DEFAULT_HYDROPONIC_TOPIC: &str = "hydroponic-manager/sensors";
/// Topic the water-level meter publishes telemetry on.
pub const DEFAULT_WATER_METER_TOPIC: &str = "water-meter/sensors";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// MQTT subscriber settings.
    pub mqtt: MqttConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration, reporting every problem at once.
    ///
    /// # Example
    ///
    /// ```
    /// use sensorhub_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.mqtt.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                Ok(_) => {}
                Err(_) => errors.push(ValidationError::new(
                    "server.bind",
                    format!("invalid port '{}': must be a number 1-65535", port),
                )),
            },
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: sensorhub_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        errors
    }
}

/// MQTT subscriber configuration.
///
/// ```toml
/// [mqtt]
/// enabled = true
/// broker = "mqtts://broker.example.com:8883"
/// client_id = "sensorhub"
/// ca_file = "/etc/sensorhub/ca.pem"
/// client_cert = "/etc/sensorhub/client.crt"
/// client_key = "/etc/sensorhub/client.key"
/// hydroponic_topic = "hydroponic-manager/sensors"
/// water_meter_topic = "water-meter/sensors"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Whether the subscriber is started.
    pub enabled: bool,
    /// Broker URL, `mqtt://host[:port]` or `mqtts://host[:port]`.
    pub broker: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM file with the CA that signed the broker certificate.
    pub ca_file: Option<PathBuf>,
    /// PEM client certificate for brokers requiring mutual TLS.
    pub client_cert: Option<PathBuf>,
    /// PKCS#8 PEM private key matching `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
    pub hydroponic_topic: String,
    pub water_meter_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: "mqtt://localhost:1883".to_string(),
            client_id: "sensorhub".to_string(),
            username: None,
            password: None,
            ca_file: None,
            client_cert: None,
            client_key: None,
            keep_alive: 30,
            hydroponic_topic: DEFAULT_HYDROPONIC_TOPIC.to_string(),
            water_meter_topic: DEFAULT_WATER_METER_TOPIC.to_string(),
        }
    }
}

/// Shortest keep-alive rumqttc accepts.
pub const MIN_KEEP_ALIVE: u64 = 5;

impl MqttConfig {
    /// Validate MQTT configuration.
    ///
    /// Nothing is checked while the subscriber is disabled.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !self.enabled {
            return errors;
        }

        if !self.broker.starts_with("mqtt://") && !self.broker.starts_with("mqtts://") {
            errors.push(ValidationError::new(
                "mqtt.broker",
                format!(
                    "invalid broker URL '{}': must start with mqtt:// or mqtts://",
                    self.broker
                ),
            ));
        }

        if self.client_id.is_empty() {
            errors.push(ValidationError::new(
                "mqtt.client_id",
                "client id cannot be empty",
            ));
        }

        if self.username.is_some() != self.password.is_some() {
            errors.push(ValidationError::new(
                "mqtt.username",
                "username and password must be set together",
            ));
        }

        if self.client_cert.is_some() != self.client_key.is_some() {
            errors.push(ValidationError::new(
                "mqtt.client_cert",
                "client certificate and key must be set together",
            ));
        } else if self.client_cert.is_some() && !self.broker.starts_with("mqtts://") {
            errors.push(ValidationError::new(
                "mqtt.client_cert",
                "client certificates require an mqtts:// broker",
            ));
        }

        if self.keep_alive < MIN_KEEP_ALIVE {
            errors.push(ValidationError::new(
                "mqtt.keep_alive",
                format!(
                    "keep alive {} is too short (minimum {} seconds)",
                    self.keep_alive, MIN_KEEP_ALIVE
                ),
            ));
        }

        for (field, topic) in [
            ("mqtt.hydroponic_topic", &self.hydroponic_topic),
            ("mqtt.water_meter_topic", &self.water_meter_topic),
        ] {
            if topic.is_empty() {
                errors.push(ValidationError::new(field, "topic cannot be empty"));
            } else if topic.contains(['#', '+']) {
                errors.push(ValidationError::new(
                    field,
                    format!("topic '{}' cannot contain wildcards", topic),
                ));
            }
        }

        if self.hydroponic_topic == self.water_meter_topic {
            errors.push(ValidationError::new(
                "mqtt.water_meter_topic",
                format!(
                    "topic '{}' is already used by the hydroponic manager",
                    self.water_meter_topic
                ),
            ));
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `mqtt.broker`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sensorhub")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_fields(config: &Config) -> Vec<String> {
        match config.validate() {
            Err(ConfigError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.hydroponic_topic, "hydroponic-manager/sensors");
        assert_eq!(config.mqtt.water_meter_topic, "water-meter/sensors");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, sensorhub_store::default_db_path());
    }

    #[test]
    fn test_mqtt_config_partial_toml_keeps_defaults() {
        let toml = r#"
            [mqtt]
            broker = "mqtts://broker.example.com"
            ca_file = "/etc/sensorhub/ca.pem"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.broker, "mqtts://broker.example.com");
        assert_eq!(config.mqtt.ca_file, Some(PathBuf::from("/etc/sensorhub/ca.pem")));
        assert_eq!(config.mqtt.client_id, "sensorhub");
        assert_eq!(config.mqtt.keep_alive, 30);
        assert_eq!(config.mqtt.water_meter_topic, DEFAULT_WATER_METER_TOPIC);
    }

    #[test]
    fn test_config_load_full_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(
            &config_path,
            r#"
            [server]
            bind = "0.0.0.0:9090"

            [storage]
            path = "/tmp/test.db"

            [mqtt]
            enabled = false
            username = "hub"
            password = "secret"
            hydroponic_topic = "greenhouse/a/sensors"
            "#,
        )
        .unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert!(!loaded.mqtt.enabled);
        assert_eq!(loaded.mqtt.username.as_deref(), Some("hub"));
        assert_eq!(loaded.mqtt.hydroponic_topic, "greenhouse/a/sensors");
        assert_eq!(loaded.mqtt.water_meter_topic, DEFAULT_WATER_METER_TOPIC);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_load_rejected_by_validation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[server]\nbind = \"localhost\"\n").unwrap();

        let config = Config::load(&config_path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = Config::default();
        config.server.bind = "127.0.0.1:0".to_string();
        assert_eq!(validation_fields(&config), vec!["server.bind"]);

        config.server.bind = "127.0.0.1:http".to_string();
        assert_eq!(validation_fields(&config), vec!["server.bind"]);

        config.server.bind = String::new();
        assert_eq!(validation_fields(&config), vec!["server.bind"]);
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let mut config = Config::default();
        config.storage.path = PathBuf::new();
        config.mqtt.broker = "tcp://localhost".to_string();
        config.mqtt.username = Some("hub".to_string());
        config.mqtt.keep_alive = 1;
        config.mqtt.hydroponic_topic = "sensors/#".to_string();

        let fields = validation_fields(&config);
        assert_eq!(
            fields,
            vec![
                "storage.path",
                "mqtt.broker",
                "mqtt.username",
                "mqtt.keep_alive",
                "mqtt.hydroponic_topic",
            ]
        );
    }

    #[test]
    fn test_mqtt_client_certificate_validation() {
        let mut config = Config::default();
        config.mqtt.client_cert = Some(PathBuf::from("/etc/sensorhub/client.crt"));
        assert_eq!(validation_fields(&config), vec!["mqtt.client_cert"]);

        config.mqtt.client_key = Some(PathBuf::from("/etc/sensorhub/client.key"));
        assert_eq!(validation_fields(&config), vec!["mqtt.client_cert"]);

        config.mqtt.broker = "mqtts://broker.example.com:8883".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mqtt_duplicate_topics_rejected() {
        let mut config = Config::default();
        config.mqtt.water_meter_topic = config.mqtt.hydroponic_topic.clone();
        assert_eq!(validation_fields(&config), vec!["mqtt.water_meter_topic"]);
    }

    #[test]
    fn test_mqtt_disabled_skips_validation() {
        let mut config = Config::default();
        config.mqtt.enabled = false;
        config.mqtt.broker = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError::new("mqtt.broker", "bad")]);
        assert_eq!(
            err.to_string(),
            "Configuration validation failed:\n  - mqtt.broker: bad"
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("sensorhub/server.toml"));
    }
}
