//! Caller-facing command surface

pub mod dispatcher;
pub mod gadget;

pub use dispatcher::CommandDispatcher;
pub use gadget::{GadgetControl, GadgetController};
