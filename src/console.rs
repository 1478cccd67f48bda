//! Text front-end: turns button labels such as `Relay 3 ON` or `Mode: Sequential`
//! into relay authority calls and renders every outcome as one reply.

use log::debug;
use log::error;

use crate::relay_ctl::RelayAuthority;
use crate::relay_ctl::RelayError;
use crate::relay_types::RelayId;
use crate::relay_types::RelayState;
use crate::relay_types::ALL_MODES;
use crate::transport::Transport;

use std::io;
use std::io::BufRead;
use std::io::Write;
use thiserror::Error;

const WELCOME: &str = "Welcome to the relay console!\n\
Use the keyboard labels below to control relays and modes.";

const HELP: &str = "Relay console commands:\n\n\
- Relay <n> ON / Relay <n> OFF: switch a single relay\n\
- Modes:\n  \
  • Mode: Normal: manual control\n  \
  • Mode: All ON: turn all relays on\n  \
  • Mode: All OFF: turn all relays off\n  \
  • Mode: Alternating: alternate between odd and even relays\n  \
  • Mode: Sequential: activate one relay at a time in sequence\n\
- Status: show the last commanded relay states";

const UNRECOGNIZED: &str = "Unrecognized command. Please use the provided keyboard.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Start,
    Help,
    Relay { id: RelayId, state: RelayState },
    Mode(String),
    Status,
    Unrecognized,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseRequestError {
    #[error("Expected 'Relay <n> ON|OFF', got '{0}'")]
    MalformedRelay(String),

    #[error("Invalid relay number '{0}'")]
    RelayNumber(String),

    #[error("Invalid relay state '{0}', expected ON or OFF")]
    RelayState(String),
}

pub fn parse_request(text: &str) -> Result<Request, ParseRequestError> {
    let text = text.trim();

    if let Some(name) = text.strip_prefix("Mode:") {
        return Ok(Request::Mode(name.trim().to_string()));
    }

    if text.starts_with("Relay") {
        let parts: Vec<&str> = text.split_whitespace().collect();
        let (id, state) = match parts.as_slice() {
            ["Relay", id, state] => (*id, *state),
            _ => return Err(ParseRequestError::MalformedRelay(text.to_string())),
        };
        let id = id
            .parse::<RelayId>()
            .map_err(|_| ParseRequestError::RelayNumber(id.to_string()))?;
        let state = match state.to_ascii_uppercase().as_str() {
            "ON" => RelayState::On,
            "OFF" => RelayState::Off,
            _ => return Err(ParseRequestError::RelayState(state.to_string())),
        };
        return Ok(Request::Relay { id, state });
    }

    let request = match text {
        "/start" => Request::Start,
        "/help" => Request::Help,
        "Status" => Request::Status,
        _ => Request::Unrecognized,
    };
    Ok(request)
}

/// Button rows: one ON/OFF pair per relay, then the modes two per row with
/// `Status` in the last free slot.
pub fn keyboard(relay_count: usize) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = (1..=relay_count)
        .map(|id| vec![format!("Relay {} ON", id), format!("Relay {} OFF", id)])
        .collect();

    let mut labels: Vec<String> = ALL_MODES
        .iter()
        .map(|mode| format!("Mode: {}", mode.label()))
        .collect();
    labels.push(String::from("Status"));
    for pair in labels.chunks(2) {
        rows.push(pair.to_vec());
    }
    rows
}

pub struct Console<T: Transport> {
    authority: RelayAuthority<T>,
}

impl<T: Transport> Console<T> {
    pub fn new(authority: RelayAuthority<T>) -> Console<T> {
        Console { authority }
    }

    pub fn authority(&self) -> &RelayAuthority<T> {
        &self.authority
    }

    pub fn into_authority(self) -> RelayAuthority<T> {
        self.authority
    }

    /// Always produces exactly one reply, failures included.
    pub fn handle(&mut self, text: &str) -> String {
        debug!("Request '{}'", text.trim());
        let request = match parse_request(text) {
            Ok(request) => request,
            Err(e) => return format!("Error processing relay command: {}", e),
        };

        match request {
            Request::Start => format!("{}\n\n{}", WELCOME, self.render_keyboard()),
            Request::Help => HELP.to_string(),
            Request::Relay { id, state } => match self.authority.toggle_relay(id, state) {
                Ok(ack) => format!("Command sent: Relay {} {}\nResponse: {}", id, state, ack),
                Err(e) => {
                    log_failure(&e);
                    format!("Error processing relay command: {}", e)
                }
            },
            Request::Mode(name) => match self.authority.set_mode(&name) {
                Ok(ack) => format!(
                    "Mode set to: {}\nResponse: {}",
                    self.authority.current_mode(),
                    ack
                ),
                Err(e) => {
                    log_failure(&e);
                    format!("Error processing mode command: {}", e)
                }
            },
            Request::Status => self.render_status(),
            Request::Unrecognized => UNRECOGNIZED.to_string(),
        }
    }

    /// Serves one request per non-empty input line until end of input. Lines
    /// that are not valid UTF-8 are decoded lossily and still get a reply.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.handle(&line);
            writeln!(output, "{}\n", reply)?;
            output.flush()?;
        }
    }

    fn render_status(&self) -> String {
        let mut status = format!(
            "Relay Status (last commanded, not read back from the board):\nMode: {}",
            self.authority.current_mode()
        );
        for (id, state) in self.authority.status() {
            status.push_str(&format!("\nRelay {}: {}", id, state));
        }
        status
    }

    fn render_keyboard(&self) -> String {
        keyboard(self.authority.relay_count())
            .iter()
            .map(|row| format!("[ {} ]", row.join(" | ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn log_failure(e: &RelayError) {
    if let RelayError::TransportError(e) = e {
        error!("Error sending command to device: {}", e);
    }
}
