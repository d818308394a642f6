//! Connection lifecycle and publish synchronisation
//!
//! [`ConnectionManager`] owns the transport and the connection state, and runs
//! at most one reconnection episode at a time. [`PublishGate`] is the only path
//! publishers take to the transport.

pub mod gate;
pub mod manager;
pub mod metrics;
pub mod options;
pub mod retry;
pub mod state;

pub use gate::{GateConfig, PublishGate};
pub use manager::ConnectionManager;
pub use metrics::{ConnectionMetrics, MetricsSnapshot};
pub use options::{ConnectionOptions, ConnectionOptionsBuilder, Credentials};
pub use retry::{ReconnectionDecision, RetryPolicy, RetryState};
pub use state::{ConnectionEvent, ConnectionState, Transition};
