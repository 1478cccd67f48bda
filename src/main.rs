mod console;
mod line_codec;
mod relay_ctl;
mod relay_types;
mod serial_port;
mod smoke_test;
mod transport;

use log::info;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use console::Console;
use relay_ctl::RelayAuthority;
use relay_ctl::DEFAULT_READ_TIMEOUT;
use relay_ctl::DEFAULT_RELAY_COUNT;
use serial_port::SerialTransport;
use serial_port::DEFAULT_BAUD_RATE;
use serial_port::DEFAULT_RESET_DELAY;
use smoke_test::Dwell;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drives a serial relay board through its line protocol")]
struct Args {
    /// Serial device of the relay board, e.g. /dev/ttyACM0
    #[arg(short, long, env = "RELAY_SERIAL_PORT")]
    port: PathBuf,

    #[arg(short, long, env = "RELAY_BAUD_RATE", default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Number of relays on the board
    #[arg(
        short,
        long,
        env = "RELAY_COUNT",
        default_value_t = DEFAULT_RELAY_COUNT as u8,
        value_parser = clap::value_parser!(u8).range(1..=64)
    )]
    relays: u8,

    /// How long to wait for the board to acknowledge a command
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Pause after opening the port while the board reboots
    #[arg(long, default_value_t = DEFAULT_RESET_DELAY.as_millis() as u64)]
    reset_delay_ms: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long)]
    quiet: bool,

    /// Prefix log lines with a timestamp
    #[arg(long)]
    timestamp: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Read button labels from stdin and answer each one on stdout (default)
    Console,

    /// Click through every relay and mode to check the wiring
    Test {
        #[arg(long, default_value_t = 1000)]
        on_ms: u64,

        #[arg(long, default_value_t = 500)]
        off_ms: u64,

        #[arg(long, default_value_t = 3000)]
        mode_ms: u64,
    },
}

fn init_logging(args: &Args) -> Result<()> {
    let timestamp = match args.timestamp {
        true => stderrlog::Timestamp::Millisecond,
        false => stderrlog::Timestamp::Off,
    };
    stderrlog::new()
        .module(module_path!())
        .quiet(args.quiet)
        .verbosity(args.verbose as usize + 2)
        .timestamp(timestamp)
        .init()
        .context("Failed to initialize logging")?;
    Ok(())
}

fn open_authority(args: &Args) -> Result<RelayAuthority<SerialTransport>> {
    if serial_port::baud_rate(args.baud).is_none() {
        bail!("Unsupported baud rate {}", args.baud);
    }
    if args.timeout_ms == 0 {
        bail!("--timeout-ms must be greater than 0");
    }

    let transport = SerialTransport::open(
        &args.port,
        args.baud,
        Duration::from_millis(args.reset_delay_ms),
    )
    .with_context(|| format!("Failed to connect to '{}'", args.port.display()))?;

    Ok(RelayAuthority::new(
        transport,
        args.relays as usize,
        Duration::from_millis(args.timeout_ms),
    ))
}

fn run(args: Args) -> Result<()> {
    let mut authority = open_authority(&args)?;

    match args.command.unwrap_or(Cmd::Console) {
        Cmd::Console => {
            let mut console = Console::new(authority);
            let stdin = io::stdin();
            console.run(stdin.lock(), io::stdout())?;
            authority = console.into_authority();
        }
        Cmd::Test {
            on_ms,
            off_ms,
            mode_ms,
        } => {
            let dwell = Dwell {
                on: Duration::from_millis(on_ms),
                off: Duration::from_millis(off_ms),
                mode: Duration::from_millis(mode_ms),
            };
            smoke_test::run(&mut authority, &dwell, &mut io::stdout())?;
        }
    }

    let mut transport = authority.into_transport();
    transport.close();
    info!("Shut down");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    run(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_library_constants() {
        let args = Args::try_parse_from(["relay-serial-ctl", "--port", "/dev/ttyACM0"]).unwrap();
        assert_eq!(Duration::from_millis(args.timeout_ms), DEFAULT_READ_TIMEOUT);
        assert_eq!(Duration::from_millis(args.reset_delay_ms), DEFAULT_RESET_DELAY);
        assert_eq!(args.baud, DEFAULT_BAUD_RATE);
        assert_eq!(args.relays as usize, DEFAULT_RELAY_COUNT);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_relay_count_is_bounded() {
        let result = Args::try_parse_from(["relay-serial-ctl", "--port", "x", "--relays", "0"]);
        assert!(result.is_err());
    }
}
