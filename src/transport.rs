use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Device not connected")]
    Closed,

    #[error("No acknowledgement from device within {0:?}")]
    Timeout(Duration),

    #[error("Communication with device failed: {0}")]
    Io(#[from] io::Error),
}

/// Line-framed byte channel to the relay board.
pub trait Transport {
    /// Writes `line` followed by `\n`.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Reads up to and including the next `\n`. Returns an empty buffer if no
    /// complete line arrived before `timeout` elapsed.
    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    fn is_open(&self) -> bool;
}

#[cfg(test)]
pub mod mock {
    use super::Transport;
    use super::TransportError;
    use crate::line_codec::Command;

    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Debug)]
    pub enum Reply {
        Line(&'static str),
        Silence,
        Fault,
    }

    /// Scripted device. Replies are consumed in order; once the script runs out
    /// the device echoes `OK <command>`.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        written: Arc<Mutex<Vec<String>>>,
        replies: Arc<Mutex<VecDeque<Reply>>>,
        closed: bool,
        fail_writes: bool,
        last_timeout: Arc<Mutex<Option<Duration>>>,
    }

    impl MockTransport {
        pub fn new() -> MockTransport {
            MockTransport::default()
        }

        pub fn closed() -> MockTransport {
            MockTransport {
                closed: true,
                ..MockTransport::default()
            }
        }

        pub fn failing_writes() -> MockTransport {
            MockTransport {
                fail_writes: true,
                ..MockTransport::default()
            }
        }

        pub fn reply(self, reply: Reply) -> MockTransport {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn written(&self) -> Vec<String> {
            self.written.lock().unwrap().clone()
        }

        pub fn last_timeout(&self) -> Option<Duration> {
            *self.last_timeout.lock().unwrap()
        }
    }

    impl Transport for MockTransport {
        fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
            if self.closed {
                return Err(TransportError::Closed);
            }
            if self.fail_writes {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )));
            }
            self.written.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            *self.last_timeout.lock().unwrap() = Some(timeout);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Line(line)) => Ok(format!("{}\r\n", line).into_bytes()),
                Some(Reply::Silence) => Ok(Vec::new()),
                Some(Reply::Fault) => Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "framing error",
                ))),
                None => {
                    let last = self.written.lock().unwrap().last().cloned();
                    let echo = match last.as_deref().map(str::parse::<Command>) {
                        Some(Ok(command)) => format!("OK {}\r\n", command),
                        _ => String::from("ERR\r\n"),
                    };
                    Ok(echo.into_bytes())
                }
            }
        }

        fn is_open(&self) -> bool {
            !self.closed
        }
    }
}
