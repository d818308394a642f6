//! Observability for the VR gadget controller
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, parse_level, parse_spans_flag, LogFormat};

// Span macros for structured logging
pub use logging::{command_span, mqtt_span, reconnect_span};
