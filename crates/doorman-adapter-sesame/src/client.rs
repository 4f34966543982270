//! HTTP client for the SESAME cloud Web API.

use crate::sign::{encode_history, SecretKey, SignError};
use doorman_core::{LockDevice, MechStatus};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Production endpoint of the SESAME Web API.
pub const DEFAULT_BASE_URL: &str = "https://app.candyhouse.co/api/sesame2";

/// SESAME client configuration.
#[derive(Debug, Clone)]
pub struct SesameClientConfig {
    /// Base URL of the Web API
    pub base_url: String,
    /// API key issued by the vendor developer portal
    pub api_key: String,
    /// Cloud client identifier
    pub client_id: String,
    /// Device UUID
    pub device_uuid: Uuid,
    /// Device secret key
    pub secret_key: SecretKey,
    /// Request timeout
    pub timeout: Duration,
}

impl SesameClientConfig {
    /// Configuration against the production endpoint.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        client_id: impl Into<String>,
        device_uuid: Uuid,
        secret_key: SecretKey,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            client_id: client_id.into(),
            device_uuid,
            secret_key,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Command codes understood by `/cmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Lock
    Lock = 82,
    /// Unlock
    Unlock = 83,
}

impl CommandCode {
    /// Numeric code sent in the request body.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Device shadow returned by `GET {base}/{uuid}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sesame2Shadow {
    /// Battery level in percent
    #[serde(default)]
    pub battery_percentage: Option<u8>,
    /// Battery voltage
    #[serde(default)]
    pub battery_voltage: Option<f64>,
    /// Bolt position
    #[serde(default)]
    pub position: Option<i32>,
    /// Reported mechanical status
    #[serde(rename = "CHSesame2Status")]
    pub status: Sesame2Status,
    /// Shadow timestamp (Unix seconds)
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Mechanical status string reported by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sesame2Status {
    /// In lock range
    Locked,
    /// In unlock range
    Unlocked,
    /// Moving
    Moved,
    /// Any other value
    #[serde(other)]
    Unknown,
}

impl From<&Sesame2Shadow> for MechStatus {
    fn from(shadow: &Sesame2Shadow) -> Self {
        Self {
            in_lock_range: shadow.status == Sesame2Status::Locked,
            in_unlock_range: shadow.status == Sesame2Status::Unlocked,
            position: shadow.position,
            battery_percentage: shadow.battery_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandRequest {
    cmd: u8,
    history: String,
    sign: String,
}

/// HTTP client for one SESAME device.
#[derive(Clone)]
pub struct SesameClient {
    client: Client,
    config: SesameClientConfig,
}

impl SesameClient {
    /// Create a new SESAME client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: SesameClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;

        tracing::debug!(
            device_uuid = %config.device_uuid,
            client_id = %config.client_id,
            base_url = %config.base_url,
            "Created SESAME client"
        );

        Ok(Self { client, config })
    }

    /// Client configuration.
    pub fn config(&self) -> &SesameClientConfig {
        &self.config
    }

    fn device_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.device_uuid
        )
    }

    fn command_url(&self) -> String {
        format!("{}/cmd", self.device_url())
    }

    /// Fetch the device shadow.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors.
    pub async fn shadow(&self) -> Result<Sesame2Shadow, ClientError> {
        let url = self.device_url();

        tracing::trace!(url, "GET device status");

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Fetch the current mechanical status.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors.
    pub async fn status(&self) -> Result<MechStatus, ClientError> {
        let shadow = self.shadow().await?;
        Ok(MechStatus::from(&shadow))
    }

    /// Send a signed command.
    ///
    /// # Errors
    ///
    /// Returns error if signing fails or on network or API errors.
    pub async fn send_command(
        &self,
        command: CommandCode,
        history_tag: &str,
    ) -> Result<(), ClientError> {
        let url = self.command_url();
        let body = self.command_request(command, history_tag, chrono::Utc::now().timestamp())?;

        tracing::debug!(url, ?command, history_tag, "POST device command");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    fn command_request(
        &self,
        command: CommandCode,
        history_tag: &str,
        unix_secs: i64,
    ) -> Result<CommandRequest, ClientError> {
        Ok(CommandRequest {
            cmd: command.code(),
            history: encode_history(history_tag),
            sign: self.config.secret_key.sign(unix_secs)?,
        })
    }
}

impl LockDevice for SesameClient {
    type Error = ClientError;

    async fn lock(&self, history_tag: &str) -> Result<(), ClientError> {
        self.send_command(CommandCode::Lock, history_tag).await
    }

    async fn unlock(&self, history_tag: &str) -> Result<(), ClientError> {
        self.send_command(CommandCode::Unlock, history_tag).await
    }
}

/// Errors that can occur with the SESAME client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Client initialization failed
    #[error("client init error: {0}")]
    Init(String),
    /// Command could not be signed
    #[error("sign error: {0}")]
    Sign(#[from] SignError),
    /// HTTP request failed
    #[error("request error: {0}")]
    Request(String),
    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },
    /// Response parsing failed
    #[error("parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorman_core::MechRange;

    const SECRET: &str = "2b7e151628aed2a6abf7158809cf4f3c";

    fn config() -> SesameClientConfig {
        SesameClientConfig::new(
            "api-key",
            "ap-northeast-1:client",
            Uuid::parse_str("3f0f1e4a-5c2b-4d8e-9a71-0b6c2d3e4f50").unwrap(),
            SecretKey::from_hex(SECRET).unwrap(),
        )
    }

    #[test]
    fn config_defaults() {
        let config = config();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn client_creation() {
        assert!(SesameClient::new(config()).is_ok());
    }

    #[test]
    fn urls_are_built_from_uuid() {
        let mut config = config();
        config.base_url = "http://localhost:8080/api/sesame2/".to_string();
        let client = SesameClient::new(config).unwrap();

        assert_eq!(
            client.device_url(),
            "http://localhost:8080/api/sesame2/3f0f1e4a-5c2b-4d8e-9a71-0b6c2d3e4f50"
        );
        assert_eq!(
            client.command_url(),
            "http://localhost:8080/api/sesame2/3f0f1e4a-5c2b-4d8e-9a71-0b6c2d3e4f50/cmd"
        );
    }

    #[test]
    fn command_body() {
        let client = SesameClient::new(config()).unwrap();

        let body = client
            .command_request(CommandCode::Lock, "DOORMAN", 1_700_000_000)
            .unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "cmd": 82,
                "history": "RE9PUk1BTg==",
                "sign": "b40bcb3c32f6d16f921c9be940843455",
            })
        );
    }

    #[test]
    fn command_codes() {
        assert_eq!(CommandCode::Lock.code(), 82);
        assert_eq!(CommandCode::Unlock.code(), 83);
    }

    #[test]
    fn parse_shadow() {
        let body = r#"{
            "batteryPercentage": 94,
            "batteryVoltage": 5.869794721407625,
            "position": 11,
            "CHSesame2Status": "locked",
            "timestamp": 1598523693
        }"#;

        let shadow: Sesame2Shadow = serde_json::from_str(body).unwrap();
        assert_eq!(shadow.status, Sesame2Status::Locked);
        assert_eq!(shadow.battery_percentage, Some(94));

        let status = MechStatus::from(&shadow);
        assert_eq!(status.range(), MechRange::Lock);
        assert_eq!(status.position, Some(11));
    }

    #[test]
    fn parse_shadow_moving_and_unknown() {
        let moved: Sesame2Shadow =
            serde_json::from_str(r#"{"CHSesame2Status": "moved"}"#).unwrap();
        assert_eq!(MechStatus::from(&moved).range(), MechRange::Transitional);

        let odd: Sesame2Shadow =
            serde_json::from_str(r#"{"CHSesame2Status": "jammed", "position": 40}"#).unwrap();
        assert_eq!(odd.status, Sesame2Status::Unknown);
        assert_eq!(MechStatus::from(&odd).lock_state(), None);
    }
}
