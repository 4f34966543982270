//! MQTT message bus.

use crate::config::{MqttConfig, TlsConfig};
use doorman_core::StatePublisher;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, Transport};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// MQTT keep-alive interval.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Publishing and subscribing half of the MQTT connection.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Create the client and its event loop. Nothing is sent until the
    /// event loop is polled.
    ///
    /// # Errors
    ///
    /// Returns error if TLS material cannot be loaded.
    pub fn new(config: &MqttConfig, client_id: &str) -> Result<(Self, EventLoop), BusError> {
        let options = mqtt_options(config, client_id)?;
        let (client, eventloop) = AsyncClient::new(options, 100);

        Ok((Self { client }, eventloop))
    }

    /// Subscribe to a topic at QoS 0.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be queued.
    pub async fn subscribe(&self, topic: &str) -> Result<(), BusError> {
        tracing::info!(topic, "Subscribing to set-target-state topic");

        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))
    }
}

impl StatePublisher for MqttPublisher {
    type Error = BusError;

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        tracing::debug!(topic, payload, "Publishing");

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}

/// Build connection options from configuration.
///
/// # Errors
///
/// Returns error if TLS material cannot be loaded.
pub fn mqtt_options(config: &MqttConfig, client_id: &str) -> Result<MqttOptions, BusError> {
    let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
    options.set_keep_alive(KEEP_ALIVE);

    if config.username.is_some() || config.password.is_some() {
        options.set_credentials(
            config.username.clone().unwrap_or_default(),
            config.password.clone().unwrap_or_default(),
        );
    }

    if config.tls.enable {
        options.set_transport(tls_transport(&config.tls)?);
    }

    tracing::debug!(
        broker = %config.broker,
        port = config.port,
        tls = config.tls.enable,
        auth = config.username.is_some(),
        client_id,
        "Built MQTT options"
    );

    Ok(options)
}

fn tls_transport(tls: &TlsConfig) -> Result<Transport, BusError> {
    let client_auth = match (&tls.certfile, &tls.keyfile) {
        (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
        (None, None) => None,
        _ => {
            return Err(BusError::Tls(
                "client certificate and key must be provided together".to_string(),
            ))
        }
    };

    match (&tls.cafile, client_auth) {
        (Some(ca), client_auth) => Ok(Transport::tls(read_pem(ca)?, client_auth, None)),
        (None, None) => Ok(Transport::tls_with_default_config()),
        (None, Some(_)) => Err(BusError::Tls(
            "CA certificate is required when providing a client certificate".to_string(),
        )),
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, BusError> {
    fs::read(path).map_err(|e| BusError::Tls(format!("failed to read {}: {e}", path.display())))
}

/// Errors for message bus operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// TLS material could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),
    /// Subscription failed
    #[error("subscription error: {0}")]
    Subscribe(String),
    /// Publish failed
    #[error("publish error: {0}")]
    Publish(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> MqttConfig {
        MqttConfig {
            broker: "broker.local".to_string(),
            port: 8883,
            username: None,
            password: None,
            tls: TlsConfig {
                enable: false,
                cafile: None,
                certfile: None,
                keyfile: None,
            },
        }
    }

    #[test]
    fn plain_options() {
        let options = mqtt_options(&config(), "doorman-test").unwrap();

        assert_eq!(options.broker_address(), ("broker.local".to_string(), 8883));
        assert_eq!(options.keep_alive(), KEEP_ALIVE);
        assert_eq!(options.client_id(), "doorman-test");
        assert!(options.credentials().is_none());
    }

    #[test]
    fn credentials_when_either_half_present() {
        let mut config = config();
        config.password = Some("hunter2".to_string());

        let options = mqtt_options(&config, "doorman-test").unwrap();

        assert_eq!(
            options.credentials(),
            Some((String::new(), "hunter2".to_string()))
        );
    }

    #[test]
    fn tls_with_missing_ca_file_fails() {
        let mut config = config();
        config.tls.enable = true;
        config.tls.cafile = Some(PathBuf::from("/nonexistent/ca.pem"));

        let err = mqtt_options(&config, "doorman-test").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ca.pem"));
    }

    #[test]
    fn tls_client_cert_without_ca_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");
        fs::write(&cert, "cert").unwrap();
        fs::write(&key, "key").unwrap();

        let mut config = config();
        config.tls.enable = true;
        config.tls.certfile = Some(cert);
        config.tls.keyfile = Some(key);

        assert!(matches!(
            mqtt_options(&config, "doorman-test"),
            Err(BusError::Tls(_))
        ));
    }

    #[test]
    fn tls_with_ca_file_uses_tls_transport() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        fs::write(&ca, "ca").unwrap();

        let mut config = config();
        config.tls.enable = true;
        config.tls.cafile = Some(ca);

        let options = mqtt_options(&config, "doorman-test").unwrap();
        assert!(matches!(options.transport(), Transport::Tls(_)));
    }

    #[test]
    fn tls_disabled_ignores_paths() {
        let mut config = config();
        config.tls.cafile = Some(PathBuf::from("/nonexistent/ca.pem"));
        config.tls.certfile = Some(PathBuf::from("/nonexistent/client.pem"));

        let options = mqtt_options(&config, "doorman-test").unwrap();
        assert!(matches!(options.transport(), Transport::Tcp));
    }
}
