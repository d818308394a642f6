//! Testing utilities and mock implementations
//!
//! Lets the connection core be exercised without a running MQTT broker.

pub mod mocks;

pub use mocks::*;
