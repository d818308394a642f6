//! Connection state machine
//!
//! All state changes go through [`ConnectionState::transition`]. Events that
//! have no edge from the current state are ignored rather than rejected; the
//! reconnection guard relies on `DisconnectDetected` being a no-op while a
//! reconnection episode is already running.

use std::fmt;
use tracing::{error, info, warn};

/// Connection status as seen by publishers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session and no recovery in progress
    #[default]
    Disconnected,
    /// Initial connect in progress
    Connecting,
    /// Session established and ready for publishing
    Connected,
    /// A reconnection episode is running
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    pub fn can_publish(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Apply an event, returning the resulting state or `None` when the event
    /// has no edge from `self`
    pub fn transition(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Some(Connecting),
            (Connecting, ConnectSucceeded) => Some(Connected),
            (Connecting, ConnectFailed) => Some(Disconnected),
            (Connected, DisconnectDetected) => Some(Reconnecting),
            (Disconnected, DisconnectDetected) => Some(Reconnecting),
            (Reconnecting, ConnectSucceeded) => Some(Connected),
            (Reconnecting, ReconnectExhausted) => Some(Disconnected),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// First connect is starting
    ConnectRequested,
    /// Transport confirmed a session
    ConnectSucceeded,
    /// Transport rejected or timed out a connect
    ConnectFailed,
    /// Session loss reported by the transport or inferred from a failed publish
    DisconnectDetected,
    /// A reconnection episode ran out of attempts
    ReconnectExhausted,
}

/// Outcome of applying an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: ConnectionState,
        to: ConnectionState,
    },
    Ignored {
        state: ConnectionState,
        event: ConnectionEvent,
    },
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

/// Log a state transition at a level matching its severity
pub fn log_state_transition(from: ConnectionState, to: ConnectionState) {
    match (from, to) {
        (ConnectionState::Connecting, ConnectionState::Connected) => {
            info!("MQTT connection established");
        }
        (ConnectionState::Connected, ConnectionState::Reconnecting) => {
            warn!("MQTT connection lost, starting reconnection");
        }
        (ConnectionState::Disconnected, ConnectionState::Reconnecting) => {
            info!("Restarting reconnection after previous episode gave up");
        }
        (ConnectionState::Reconnecting, ConnectionState::Connected) => {
            info!("Reconnection successful");
        }
        (ConnectionState::Reconnecting, ConnectionState::Disconnected) => {
            error!("Reconnection attempts exhausted, connection is down");
        }
        _ => {
            info!(%from, %to, "MQTT connection state changed");
        }
    }
}
