//! VR gadget controller
//!
//! A resilient MQTT command publisher. Named commands such as `start_heating`
//! are published as `{"data":"<name>"}` on the `VRGadget/command` topic while
//! the connection layer keeps the broker session alive.
//!
//! # Overview
//!
//! - [`connection`] - state machine, retry policy, connection manager and publish gate
//! - [`controller`] - command dispatcher and the [`GadgetControl`] surface
//! - [`transport`] - the transport trait and its rumqttc implementation
//! - [`protocol`] - topic and payload encoding
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vrgadget::config::ControllerConfig;
//! use vrgadget::controller::{GadgetControl, GadgetController};
//! use vrgadget::transport::MqttTransport;
//!
//! # tokio_test::block_on(async {
//! let config = ControllerConfig::default();
//! let controller = GadgetController::from_config(MqttTransport::new(), &config)?;
//!
//! controller.initialize().await?;
//! controller.start_heating().await?;
//! controller.finish_heating().await?;
//! controller.shutdown().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, ControllerConfig};
pub use connection::{ConnectionState, MetricsSnapshot};
pub use controller::{GadgetControl, GadgetController};
pub use error::{ConnectionError, ControllerError, ControllerResult, PublishError};
pub use protocol::{Command, GadgetCommand, COMMAND_TOPIC};
