//! Configuration system for the VR gadget controller
//!
//! Configuration is read from a TOML file with three sections. Only `[mqtt]`
//! is required; `[reconnect]` and `[publish]` fall back to the defaults used
//! by the controller when they are omitted.

use crate::connection::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main controller configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    pub mqtt: MqttSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub publish: PublishSection,
}

/// MQTT broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Client identifier presented to the broker (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Upper bound for a single connect attempt, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_client_id() -> String {
    "vr-gadget-controller".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

/// Reconnection backoff settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Attempts per reconnection episode before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first attempt; attempt `n` waits `n * base_delay_ms`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay
    #[serde(default = "default_cap_delay_ms")]
    pub cap_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    5_000
}

fn default_cap_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            cap_delay_ms: default_cap_delay_ms(),
        }
    }
}

/// Settings for publishes that arrive while a reconnection is running
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishSection {
    /// How often a waiting publish re-checks the connection state
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum total time a publish waits for reconnection to finish
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_wait_ms() -> u64 {
    30_000
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid client ID format: {0}")]
    InvalidClientId(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttSection {
                broker_url: "mqtt://mqtt.beebotte.com:1883".to_string(),
                client_id: default_client_id(),
                username_env: Some("BEEBOTTE_TOKEN".to_string()),
                password_env: Some("BEEBOTTE_TOKEN".to_string()),
                keep_alive_secs: default_keep_alive(),
                connect_timeout_secs: default_connect_timeout(),
            },
            reconnect: ReconnectSection::default(),
            publish: PublishSection::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_id(&self.mqtt.client_id)?;
        parse_broker_url(&self.mqtt.broker_url)?;

        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.reconnect.validate()?;
        self.publish.validate()?;
        Ok(())
    }

    /// Get MQTT username from environment variable
    pub fn mqtt_username(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn mqtt_password(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
client_id = "test-controller"

[reconnect]
max_retries = 3
base_delay_ms = 10
cap_delay_ms = 40

[publish]
poll_interval_ms = 5
max_wait_ms = 100
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

impl ReconnectSection {
    fn validate(&self) -> Result<(), ConfigError> {
        RetryPolicy::from(self)
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("[reconnect] {e}")))
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn cap_delay(&self) -> Duration {
        Duration::from_millis(self.cap_delay_ms)
    }
}

impl PublishSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_wait_ms < self.poll_interval_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "max_wait_ms ({}) must not be below poll_interval_ms ({})",
                self.max_wait_ms, self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

/// Client IDs are restricted to characters every broker accepts
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

/// Parse a broker URL into `(host, port, tls)`
pub fn parse_broker_url(broker_url: &str) -> Result<(String, u16, bool), ConfigError> {
    let url =
        Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

    let tls = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" => true,
        other => {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "unsupported scheme '{other}' in {broker_url}"
            )))
        }
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok((host.to_string(), port, tls))
}
