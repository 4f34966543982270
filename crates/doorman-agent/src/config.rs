//! Bridge configuration.

use crate::schema::{Schema, SchemaError, Violations};
use doorman_adapter_sesame::{SecretKey, SesameClientConfig};
use doorman_core::DEFAULT_HISTORY_TAG;
use doorman_proto::HomebridgeTopics;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Bridge configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Homebridge lock topics
    pub homebridge: HomebridgeTopics,

    /// MQTT broker connection
    pub mqtt: MqttConfig,

    /// SESAME device credentials
    pub sesame: SesameConfig,
}

/// MQTT broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address
    pub broker: String,

    /// Broker port
    pub port: u16,

    /// Optional user name
    pub username: Option<String>,

    /// Optional password
    pub password: Option<String>,

    /// TLS settings
    pub tls: TlsConfig,
}

/// MQTT TLS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Connect over TLS
    pub enable: bool,

    /// CA certificate (PEM)
    pub cafile: Option<PathBuf>,

    /// Client certificate (PEM)
    pub certfile: Option<PathBuf>,

    /// Client private key (PEM)
    pub keyfile: Option<PathBuf>,
}

/// SESAME device configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SesameConfig {
    /// Web API key
    pub api_key: String,

    /// Cloud client identifier
    pub client_id: String,

    /// Device UUID
    pub uuid: Uuid,

    /// Device secret key, 32 hex characters
    pub secret_key: String,

    /// Status poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// History label for device actions
    #[serde(default)]
    pub history_tag: Option<String>,

    /// Web API base URL override
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Config {
    /// Load a config file and validate it against a schema file.
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be read or parsed, the config
    /// violates the schema, or a value is semantically invalid.
    pub fn load(config_path: &Path, schema_path: &Path) -> Result<Self, ConfigError> {
        let schema = Schema::from_yaml(&read(schema_path)?)?;
        Self::from_yaml(&read(config_path)?, &schema)
    }

    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn from_yaml(text: &str, schema: &Schema) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        schema.validate(&document)?;

        let config: Self =
            serde_yaml::from_value(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let tls = &self.mqtt.tls;
        if tls.enable {
            if tls.certfile.is_some() != tls.keyfile.is_some() {
                return Err(ConfigError::Invalid(
                    "mqtt.tls.certfile and mqtt.tls.keyfile must be provided together"
                        .to_string(),
                ));
            }
            if tls.certfile.is_some() && tls.cafile.is_none() {
                return Err(ConfigError::Invalid(
                    "mqtt.tls.cafile is required when providing a client certificate".to_string(),
                ));
            }
        }

        SecretKey::from_hex(&self.sesame.secret_key)
            .map_err(|e| ConfigError::Invalid(format!("sesame.secret_key: {e}")))?;

        if self.sesame.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sesame.poll_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Interval between device status reads.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sesame.poll_interval_secs)
    }

    /// History label sent with device actions.
    #[must_use]
    pub fn history_tag(&self) -> &str {
        self.sesame
            .history_tag
            .as_deref()
            .unwrap_or(DEFAULT_HISTORY_TAG)
    }

    /// SESAME client configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is malformed.
    pub fn sesame_client(&self) -> Result<SesameClientConfig, ConfigError> {
        let secret_key = SecretKey::from_hex(&self.sesame.secret_key)
            .map_err(|e| ConfigError::Invalid(format!("sesame.secret_key: {e}")))?;

        let mut config = SesameClientConfig::new(
            self.sesame.api_key.clone(),
            self.sesame.client_id.clone(),
            self.sesame.uuid,
            secret_key,
        );
        if let Some(base_url) = &self.sesame.base_url {
            config.base_url.clone_from(base_url);
        }

        Ok(config)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Errors that can occur loading the configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {}: {message}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// I/O error
        message: String,
    },
    /// Schema document is invalid
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Config is not valid YAML or does not deserialize
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config violates the schema
    #[error("config validation failed: {0}")]
    Violations(#[from] Violations),
    /// Config value is semantically invalid
    #[error("invalid config: {0}")]
    Invalid(String),
}
