//! Pure session configuration for the MQTT transport
//!
//! This module turns [`ConnectionOptions`] into rumqttc options and maps
//! delivery guarantees to QoS levels. Nothing here performs I/O.

use crate::connection::ConnectionOptions;
use crate::transport::DeliveryGuarantee;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use thiserror::Error;

/// Capacity of the request channel between `AsyncClient` and `EventLoop`
pub const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Session status as reported by the event-loop task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Waiting for ConnAck
    Connecting,
    /// Broker acknowledged the session
    Up,
    /// Session ended with reason
    Down(String),
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailedStr(String),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not connected to broker")]
    NotConnected,
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Build rumqttc options for one session
pub fn configure_mqtt_options(options: &ConnectionOptions) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(options.client_id(), options.host(), options.port());

    if options.tls() {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(credentials) = options.credentials() {
        mqtt_options.set_credentials(&credentials.username, &credentials.password);
    }

    mqtt_options.set_keep_alive(options.keep_alive());
    mqtt_options.set_clean_start(true);

    mqtt_options
}

/// Map a delivery guarantee to the matching QoS level
pub fn qos_for(guarantee: DeliveryGuarantee) -> QoS {
    match guarantee {
        DeliveryGuarantee::AtMostOnce => QoS::AtMostOnce,
        DeliveryGuarantee::AtLeastOnce => QoS::AtLeastOnce,
        DeliveryGuarantee::ExactlyOnce => QoS::ExactlyOnce,
    }
}
