use log::debug;
use log::info;
use log::warn;

use crate::line_codec::decode_ack;
use crate::line_codec::encode_mode;
use crate::line_codec::encode_relay;
use crate::line_codec::Acknowledgement;
use crate::line_codec::Command;
use crate::relay_types::Mode;
use crate::relay_types::ParseModeError;
use crate::relay_types::RelayId;
use crate::relay_types::RelayState;
use crate::transport::Transport;
use crate::transport::TransportError;

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RELAY_COUNT: usize = 8;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid relay number {id}, expected 1 to {count}")]
    InvalidRelay { id: RelayId, count: usize },

    #[error(transparent)]
    InvalidMode(#[from] ParseModeError),

    #[error(transparent)]
    TransportError(#[from] TransportError),
}

/// Sole owner of the current mode and the relay table.
///
/// Every exchanging operation takes `&mut self`, so a single authority never has
/// more than one command on the wire. Callers on several threads share it behind
/// one `Mutex`.
pub struct RelayAuthority<T: Transport> {
    transport: T,
    read_timeout: Duration,
    mode: Mode,
    relays: BTreeMap<RelayId, RelayState>,
}

impl<T: Transport> RelayAuthority<T> {
    /// Starts in `Mode::Normal` with every relay assumed off; the board is never
    /// asked for its actual state.
    pub fn new(transport: T, relay_count: usize, read_timeout: Duration) -> RelayAuthority<T> {
        let relays = (1..=relay_count).map(|id| (id, RelayState::Off)).collect();
        RelayAuthority {
            transport,
            read_timeout,
            mode: Mode::default(),
            relays,
        }
    }

    pub fn relay_count(&self) -> usize {
        self.relays.len()
    }

    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Last commanded state of every relay. This is intent, not a reading: the
    /// wire protocol has no query command, and modes other than `Normal` drive
    /// the relays on the board without reporting back.
    pub fn status(&self) -> &BTreeMap<RelayId, RelayState> {
        &self.relays
    }

    /// Accepted in every mode, including the ones where the board drives the
    /// relays itself.
    pub fn toggle_relay(
        &mut self,
        id: RelayId,
        state: RelayState,
    ) -> Result<Acknowledgement, RelayError> {
        if !self.relays.contains_key(&id) {
            warn!("Rejected relay {}, bank has {} relays", id, self.relays.len());
            return Err(RelayError::InvalidRelay {
                id,
                count: self.relays.len(),
            });
        }

        info!("Set 'Relay {}' to '{}'", id, state);
        let result = self.exchange(&encode_relay(id, state))?;
        self.relays.insert(id, state);
        result.map_err(RelayError::from)
    }

    /// Takes a wire id or mode name; see `Mode::from_str`.
    pub fn set_mode(&mut self, mode: &str) -> Result<Acknowledgement, RelayError> {
        let mode = match mode.parse::<Mode>() {
            Ok(mode) => mode,
            Err(e) => {
                warn!("{}", e);
                return Err(RelayError::InvalidMode(e));
            }
        };
        self.switch_mode(mode)
    }

    pub fn switch_mode(&mut self, mode: Mode) -> Result<Acknowledgement, RelayError> {
        info!("Switch mode from '{}' to '{}'", self.mode, mode);
        let result = self.exchange(&encode_mode(mode))?;
        self.mode = mode;
        result.map_err(RelayError::from)
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// One write followed by one read.
    ///
    /// The outer error means nothing left the host and state must not change.
    /// The inner result is the outcome after the line was written, at which point
    /// the command counts as issued even if the reply never comes.
    fn exchange(
        &mut self,
        command: &Command,
    ) -> Result<Result<Acknowledgement, TransportError>, TransportError> {
        if !self.transport.is_open() {
            return Err(TransportError::Closed);
        }

        let line = command.to_string();
        debug!("-> {}", line);
        self.transport.write_line(&line)?;

        let reply = match self.transport.read_line(self.read_timeout) {
            Ok(reply) => reply,
            Err(e) => return Ok(Err(e)),
        };
        if reply.is_empty() {
            return Ok(Err(TransportError::Timeout(self.read_timeout)));
        }

        let ack = decode_ack(&reply);
        debug!("<- {}", ack);
        Ok(Ok(ack))
    }
}
