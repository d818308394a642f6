//! Immutable broker connection options
//!
//! Built once at startup and reused verbatim for every reconnect so that a
//! recovered session presents exactly the same identity and credentials.

use crate::config::{parse_broker_url, ConfigError, ControllerConfig};
use std::fmt;
use std::time::Duration;

/// Username/password pair presented to the broker
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything a transport needs to open a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    host: String,
    port: u16,
    client_id: String,
    credentials: Option<Credentials>,
    keep_alive: Duration,
    connect_timeout: Duration,
    tls: bool,
}

impl ConnectionOptions {
    pub fn builder(host: impl Into<String>, port: u16) -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder {
            options: ConnectionOptions {
                host: host.into(),
                port,
                client_id: "vr-gadget-controller".to_string(),
                credentials: None,
                keep_alive: Duration::from_secs(60),
                connect_timeout: Duration::from_secs(10),
                tls: false,
            },
        }
    }

    /// Build options from loaded configuration, resolving credentials from
    /// the environment
    pub fn from_config(config: &ControllerConfig) -> Result<Self, ConfigError> {
        let (host, port, tls) = parse_broker_url(&config.mqtt.broker_url)?;

        let mut builder = Self::builder(host, port)
            .client_id(config.mqtt.client_id.clone())
            .keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs))
            .connect_timeout(Duration::from_secs(config.mqtt.connect_timeout_secs))
            .tls(tls);

        if let Some(username) = config.mqtt_username() {
            let password = config.mqtt_password().unwrap_or_default();
            builder = builder.credentials(username, password);
        }

        Ok(builder.build())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn tls(&self) -> bool {
        self.tls
    }
}

/// Builder for [`ConnectionOptions`]
#[derive(Debug)]
pub struct ConnectionOptionsBuilder {
    options: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.options.client_id = client_id.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.options.keep_alive = keep_alive;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.options.connect_timeout = connect_timeout;
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.options.tls = tls;
        self
    }

    pub fn build(self) -> ConnectionOptions {
        self.options
    }
}
