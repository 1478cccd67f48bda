//! Translation between relay/mode requests and the device's line protocol.
//!
//! ```text
//! RELAY:<id>:<0|1>
//! MODE:<m>
//! ```
//!
//! One command per line, one reply per line, ASCII, `\n` terminated.

use crate::relay_types::Mode;
use crate::relay_types::RelayId;
use crate::relay_types::RelayState;

use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::str::FromStr;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Command {
    Relay { id: RelayId, state: RelayState },
    Mode(Mode),
}

pub fn encode_relay(id: RelayId, state: RelayState) -> Command {
    Command::Relay { id, state }
}

pub fn encode_mode(mode: Mode) -> Command {
    Command::Mode(mode)
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Command::Relay { id, state } => write!(f, "RELAY:{}:{}", id, state.bit()),
            Command::Mode(mode) => write!(f, "MODE:{}", mode.wire_id()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid command line '{line}': {message}")]
pub struct ParseCommandError {
    line: String,
    message: String,
}

impl ParseCommandError {
    fn new<S1: Into<String>, S2: Into<String>>(line: S1, message: S2) -> Self {
        Self {
            line: line.into(),
            message: message.into(),
        }
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parses a wire line as the device reads it. Relay ids are only checked for
    /// being positive; the bank size is not known at this layer.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let trimmed = line.trim_end();
        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            ["RELAY", id, bit] => {
                let id = id
                    .parse::<RelayId>()
                    .ok()
                    .filter(|id| *id >= 1)
                    .ok_or_else(|| {
                        ParseCommandError::new(line, format!("Invalid relay number '{}'", id))
                    })?;
                let state = bit
                    .parse::<u8>()
                    .ok()
                    .and_then(RelayState::from_bit)
                    .ok_or_else(|| {
                        ParseCommandError::new(line, format!("Invalid relay state '{}'", bit))
                    })?;
                Ok(Command::Relay { id, state })
            }
            ["MODE", m] => m
                .parse::<u8>()
                .ok()
                .and_then(Mode::from_wire_id)
                .map(Command::Mode)
                .ok_or_else(|| ParseCommandError::new(line, format!("Invalid mode '{}'", m))),
            _ => Err(ParseCommandError::new(line, "Unknown command")),
        }
    }
}

/// Reply line from the device, trailing whitespace removed. Never interpreted.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct Acknowledgement(String);

impl Acknowledgement {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Acknowledgement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// An empty reply (bare newline) is still an acknowledgement. Getting no bytes at
/// all is a timeout and is reported by the transport instead.
pub fn decode_ack(raw: &[u8]) -> Acknowledgement {
    let text = String::from_utf8_lossy(raw);
    Acknowledgement(text.trim_end().to_string())
}
