//! Transport layer for broker communication
//!
//! This module provides the transport abstraction the connection core is
//! written against, plus the rumqttc-backed MQTT implementation.

use crate::connection::ConnectionOptions;
use bytes::Bytes;
use tokio::sync::mpsc;

pub mod mqtt;

/// Delivery guarantee requested from the broker for a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryGuarantee {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// Notification that an established session dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectNotice {
    pub reason: String,
}

impl DisconnectNotice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Transport trait for broker communication
///
/// This trait provides an abstraction over the pub/sub client so the
/// connection core can be driven by MQTT in production and by mocks in tests.
/// Implementations are only ever used by one caller at a time; the connection
/// manager serialises every call behind its exclusion lock.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a session with the broker, replacing any previous one
    async fn connect(&mut self, options: &ConnectionOptions) -> Result<(), Self::Error>;

    /// Publish a payload on a topic
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        guarantee: DeliveryGuarantee,
    ) -> Result<(), Self::Error>;

    /// Check if the session is currently up
    fn is_connected(&self) -> bool;

    /// Register the channel on which session drops are reported
    fn on_disconnected(&mut self, sender: mpsc::UnboundedSender<DisconnectNotice>);

    /// Release all transport resources
    async fn dispose(&mut self) -> Result<(), Self::Error>;
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttTransport;
