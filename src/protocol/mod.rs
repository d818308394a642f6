//! Wire format for gadget commands
//!
//! Commands are published on a single fixed topic as compact JSON of the form
//! `{"data":"<command name>"}`.

pub mod commands;

pub use commands::*;
