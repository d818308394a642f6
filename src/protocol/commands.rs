//! Command names and payload encoding

use crate::error::ControllerError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topic every command is published on
pub const COMMAND_TOPIC: &str = "VRGadget/command";

/// JSON body of a command message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub data: String,
}

/// A validated command ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
}

impl Command {
    /// Validate a command name; empty or whitespace-only names are rejected
    pub fn new(name: impl Into<String>) -> Result<Self, ControllerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ControllerError::invalid_command(
                "command name must not be empty",
            ));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &'static str {
        COMMAND_TOPIC
    }

    /// Encode as compact JSON
    pub fn payload(&self) -> Result<Bytes, serde_json::Error> {
        let body = serde_json::to_vec(&CommandPayload {
            data: self.name.clone(),
        })?;
        Ok(Bytes::from(body))
    }
}

/// The commands the gadget understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum GadgetCommand {
    StartHeating,
    FinishHeating,
    StartCooling,
    FinishCooling,
    StartSplash,
    FinishSplash,
}

impl GadgetCommand {
    pub const ALL: [GadgetCommand; 6] = [
        GadgetCommand::StartHeating,
        GadgetCommand::FinishHeating,
        GadgetCommand::StartCooling,
        GadgetCommand::FinishCooling,
        GadgetCommand::StartSplash,
        GadgetCommand::FinishSplash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GadgetCommand::StartHeating => "start_heating",
            GadgetCommand::FinishHeating => "finish_heating",
            GadgetCommand::StartCooling => "start_cooling",
            GadgetCommand::FinishCooling => "finish_cooling",
            GadgetCommand::StartSplash => "start_splash",
            GadgetCommand::FinishSplash => "finish_splash",
        }
    }
}

impl fmt::Display for GadgetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GadgetCommand {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GadgetCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| ControllerError::invalid_command(format!("unknown command '{s}'")))
    }
}

impl From<GadgetCommand> for Command {
    fn from(command: GadgetCommand) -> Self {
        Command {
            name: command.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_payload_is_compact_json() {
        let command = Command::new("start_heating").unwrap();
        assert_eq!(
            command.payload().unwrap(),
            Bytes::from_static(br#"{"data":"start_heating"}"#)
        );
        assert_eq!(command.topic(), "VRGadget/command");
    }

    #[test]
    fn test_empty_and_whitespace_names_rejected() {
        for name in ["", "   ", "\t\n"] {
            let error = Command::new(name).unwrap_err();
            assert!(error.is_invalid_command(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_payload_escapes_quotes() {
        let command = Command::new(r#"say "hi""#).unwrap();
        let decoded: CommandPayload = serde_json::from_slice(&command.payload().unwrap()).unwrap();
        assert_eq!(decoded.data, r#"say "hi""#);
    }

    #[test]
    fn test_gadget_command_names() {
        let names: Vec<&str> = GadgetCommand::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "start_heating",
                "finish_heating",
                "start_cooling",
                "finish_cooling",
                "start_splash",
                "finish_splash"
            ]
        );
    }

    #[test]
    fn test_gadget_command_from_str() {
        assert_eq!(
            "finish_splash".parse::<GadgetCommand>().unwrap(),
            GadgetCommand::FinishSplash
        );
        assert!("make_coffee".parse::<GadgetCommand>().is_err());
    }

    proptest! {
        #[test]
        fn payload_carries_name_verbatim(name in "[a-zA-Z0-9_ ]*[a-zA-Z0-9_]+") {
            let command = Command::new(name.clone()).unwrap();
            let decoded: CommandPayload =
                serde_json::from_slice(&command.payload().unwrap()).unwrap();
            prop_assert_eq!(decoded.data, name);
        }
    }
}
