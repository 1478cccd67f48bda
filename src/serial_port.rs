use log::debug;
use log::info;

use crate::transport::Transport;
use crate::transport::TransportError;

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Write;
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use std::time::Instant;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(2);

pub fn baud_rate(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

/// Serial line to the relay board, 8N1 raw mode.
///
/// The port is closed when this value is dropped.
pub struct SerialTransport {
    path: PathBuf,
    file: Option<File>,
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Opens and configures `path`, then waits `reset_delay` because most boards
    /// reboot when the port opens. Anything printed while booting is discarded.
    pub fn open<P: AsRef<Path>>(
        path: P,
        baud: u32,
        reset_delay: Duration,
    ) -> io::Result<SerialTransport> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)?;

        let transport = SerialTransport::from_file(&path, file, baud)?;

        if !reset_delay.is_zero() {
            debug!("Waiting {:?} for board reset", reset_delay);
            thread::sleep(reset_delay);
        }
        transport.discard_input()?;

        info!("Connected to '{}' at {} baud", path.display(), baud);
        Ok(transport)
    }

    /// Wraps an already opened tty.
    pub fn from_file<P: AsRef<Path>>(path: P, file: File, baud: u32) -> io::Result<SerialTransport> {
        let speed = baud_rate(baud).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Unsupported baud rate {}", baud),
            )
        })?;
        configure(file.as_raw_fd(), speed)?;
        Ok(SerialTransport {
            path: path.as_ref().to_path_buf(),
            file: Some(file),
            pending: Vec::new(),
        })
    }

    pub fn close(&mut self) {
        if self.file.take().is_some() {
            self.pending.clear();
            info!("Serial connection '{}' closed", self.path.display());
        }
    }

    fn discard_input(&self) -> io::Result<()> {
        if let Some(file) = &self.file {
            // SAFETY: the fd belongs to `file`, which outlives the call.
            if unsafe { libc::tcflush(file.as_raw_fd(), libc::TCIFLUSH) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let rest = self.pending.split_off(end + 1);
        Some(mem::replace(&mut self.pending, rest))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl Transport for SerialTransport {
    /// Drops every byte still unread, so a reply that arrived after an earlier
    /// deadline is never taken for the answer to this line.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.file.is_none() {
            return Err(TransportError::Closed);
        }
        self.pending.clear();
        self.discard_input()?;

        let file = self.file.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf)?;
        file.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 64];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if !self.pending.is_empty() {
                    debug!(
                        "Dropping incomplete line {:?}",
                        String::from_utf8_lossy(&self.pending)
                    );
                    self.pending.clear();
                }
                return Ok(Vec::new());
            }

            let file = self.file.as_mut().ok_or(TransportError::Closed)?;
            if !wait_readable(file.as_raw_fd(), remaining)? {
                continue;
            }

            match file.read(&mut buf) {
                Ok(0) => {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial line hung up",
                    )))
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

fn configure(fd: RawFd, speed: libc::speed_t) -> io::Result<()> {
    // SAFETY: termios is a plain C struct; tcgetattr fills it before use.
    let mut tio: libc::termios = unsafe { mem::zeroed() };
    // SAFETY: fd is an open descriptor and tio points to a stack local.
    unsafe {
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);
        // reads are bounded by poll(), never by the line discipline
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 0;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// `Ok(false)` on timeout or signal, the caller re-checks its deadline.
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: pfd is a single valid pollfd on the stack.
    let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(ret > 0)
}
