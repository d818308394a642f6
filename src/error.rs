//! Error types for the VR gadget controller
//!
//! Errors on the caller-facing path (`initialize`, `send`) are returned to the
//! caller. Errors inside the background reconnection loop are logged and never
//! surface here.

use crate::config::ConfigError;
use crate::connection::ConnectionState;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;

/// Boxed transport error, kept as the source of higher level errors
pub type TransportFailure = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// Create invalid command error
    pub fn invalid_command<S: Into<String>>(reason: S) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }

    pub fn is_invalid_command(&self) -> bool {
        matches!(self, ControllerError::InvalidCommand { .. })
    }

    pub fn is_publish(&self) -> bool {
        matches!(self, ControllerError::Publish(_))
    }
}

/// Failure to establish a session with the broker
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Broker rejected connection")]
    Rejected(#[source] TransportFailure),

    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connect not possible in state {state}")]
    InvalidState { state: ConnectionState },

    #[error("Controller has been shut down")]
    ShutDown,

    #[error("Failed to release transport")]
    DisposeFailed(#[source] TransportFailure),
}

/// Failure to hand a command to the broker
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    #[error("Transport publish failed after retry")]
    Transport(#[source] TransportFailure),

    #[error("Payload serialization failed")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static BEEBOTTE_TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"token_[A-Za-z0-9]+").expect("token pattern is valid"));

/// Render an error and its source chain on one line
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Strip credential-looking fragments from an error before it is logged
pub fn redact_credentials(message: &str) -> String {
    let redacted = SECRET_PATTERN.replace_all(message, "${1}=***");
    let redacted = BEEBOTTE_TOKEN_PATTERN.replace_all(&redacted, "token_***");

    if redacted.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !redacted.is_char_boundary(cut) {
            cut -= 1;
        }
        return format!("{}{}", &redacted[..cut], truncate_suffix);
    }

    redacted.into_owned()
}
