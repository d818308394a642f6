//! MQTT transport built on rumqttc v5
//!
//! The module separates pure functions from I/O:
//!
//! - [`connection`] - session options, QoS mapping and error types
//! - [`message_handler`] - classification of rumqttc events
//! - [`client`] - the event-loop task and the [`Transport`](crate::transport::Transport) impl
//!
//! # Usage
//!
//! ```rust,no_run
//! use vrgadget::connection::ConnectionOptions;
//! use vrgadget::transport::{DeliveryGuarantee, Transport};
//! use vrgadget::transport::mqtt::MqttTransport;
//!
//! # tokio_test::block_on(async {
//! let options = ConnectionOptions::builder("mqtt.beebotte.com", 1883).build();
//! let mut transport = MqttTransport::new();
//! transport.connect(&options).await?;
//! transport
//!     .publish("VRGadget/command", r#"{"data":"start_heating"}"#.into(), DeliveryGuarantee::AtLeastOnce)
//!     .await?;
//! transport.dispose().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttTransport;
pub use connection::{configure_mqtt_options, qos_for, LinkState, MqttError};
pub use message_handler::{EventRoute, MessageHandler};
