use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::str::FromStr;
use thiserror::Error;

/// 1-based relay index. Range checks against the bank size happen in `RelayAuthority`.
pub type RelayId = usize;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn from_bit(bit: u8) -> Option<RelayState> {
        match bit {
            0 => Some(RelayState::Off),
            1 => Some(RelayState::On),
            _ => None,
        }
    }

    pub fn bit(&self) -> u8 {
        match self {
            RelayState::On => 1,
            RelayState::Off => 0,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        match on {
            true => RelayState::On,
            false => RelayState::Off,
        }
    }
}

impl Display for RelayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RelayState::On => write!(f, "ON"),
            RelayState::Off => write!(f, "OFF"),
        }
    }
}

/// Collective relay behaviour. The device implements the timing of every mode,
/// the host only tells it which one to run.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    Normal,
    AllOn,
    AllOff,
    Alternating,
    Sequential,
}

pub const ALL_MODES: [Mode; 5] = [
    Mode::Normal,
    Mode::AllOn,
    Mode::AllOff,
    Mode::Alternating,
    Mode::Sequential,
];

impl Default for Mode {
    fn default() -> Self {
        Mode::Normal
    }
}

impl Mode {
    pub fn wire_id(&self) -> u8 {
        match self {
            Mode::Normal => 0,
            Mode::AllOn => 1,
            Mode::AllOff => 2,
            Mode::Alternating => 3,
            Mode::Sequential => 4,
        }
    }

    pub fn from_wire_id(id: u8) -> Option<Mode> {
        ALL_MODES.iter().copied().find(|mode| mode.wire_id() == id)
    }

    /// Button label, e.g. `All ON`.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Normal => "Normal",
            Mode::AllOn => "All ON",
            Mode::AllOff => "All OFF",
            Mode::Alternating => "Alternating",
            Mode::Sequential => "Sequential",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown mode '{0}'")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    /// Accepts a single-digit wire id (`3`), a button label (`Alternating`,
    /// `All ON`) or a constant-style name (`ALL_ON`). Case and `_`/space are not
    /// significant in names; ids like `03` or `+3` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let [digit] = trimmed.as_bytes() {
            if digit.is_ascii_digit() {
                return Mode::from_wire_id(digit - b'0')
                    .ok_or_else(|| ParseModeError(s.to_string()));
            }
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "normal" => Ok(Mode::Normal),
            "allon" => Ok(Mode::AllOn),
            "alloff" => Ok(Mode::AllOff),
            "alternating" => Ok(Mode::Alternating),
            "sequential" => Ok(Mode::Sequential),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
