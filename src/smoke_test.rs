use log::info;

use crate::relay_ctl::RelayAuthority;
use crate::relay_types::Mode;
use crate::relay_types::RelayState;
use crate::transport::Transport;

use std::io::Write;
use std::thread;
use std::time::Duration;

/// How long each step is held so the relays can be watched or heard switching.
#[derive(Clone, Debug)]
pub struct Dwell {
    pub on: Duration,
    pub off: Duration,
    pub mode: Duration,
}

/// Clicks every relay on and off, runs each bulk mode, then returns the board to
/// `Normal` and switches everything off. Stops at the first failure.
pub fn run<T: Transport, W: Write>(
    authority: &mut RelayAuthority<T>,
    dwell: &Dwell,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("Starting relay test sequence");

    for id in 1..=authority.relay_count() {
        writeln!(out, "\nTesting Relay {}:", id)?;

        let ack = authority.toggle_relay(id, RelayState::On)?;
        writeln!(out, "  ON  response: {}", ack)?;
        pause(dwell.on);

        let ack = authority.toggle_relay(id, RelayState::Off)?;
        writeln!(out, "  OFF response: {}", ack)?;
        pause(dwell.off);
    }

    writeln!(out, "\nTesting operation modes:")?;
    for mode in [Mode::AllOn, Mode::AllOff, Mode::Alternating, Mode::Sequential] {
        run_mode(authority, mode, dwell.mode, out)?;
    }

    writeln!(out, "\nReturning to Normal mode")?;
    let ack = authority.switch_mode(Mode::Normal)?;
    writeln!(out, "  Response: {}", ack)?;

    writeln!(out, "\nTurning all relays off")?;
    let ack = authority.switch_mode(Mode::AllOff)?;
    writeln!(out, "  Response: {}", ack)?;

    writeln!(out, "\nTest completed successfully!")?;
    Ok(())
}

fn run_mode<T: Transport, W: Write>(
    authority: &mut RelayAuthority<T>,
    mode: Mode,
    hold: Duration,
    out: &mut W,
) -> anyhow::Result<()> {
    writeln!(out, "\nMode: {} (holding {:?})", mode, hold)?;
    let ack = authority.switch_mode(mode)?;
    writeln!(out, "  Response: {}", ack)?;
    pause(hold);
    Ok(())
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay_ctl::RelayError;
    use crate::relay_ctl::DEFAULT_READ_TIMEOUT;
    use crate::transport::mock::MockTransport;
    use crate::transport::mock::Reply;

    fn no_dwell() -> Dwell {
        Dwell {
            on: Duration::ZERO,
            off: Duration::ZERO,
            mode: Duration::ZERO,
        }
    }

    #[test]
    fn test_full_sequence() {
        let transport = MockTransport::new();
        let mut authority = RelayAuthority::new(transport.clone(), 2, DEFAULT_READ_TIMEOUT);
        let mut out = Vec::new();

        run(&mut authority, &no_dwell(), &mut out).unwrap();

        assert_eq!(
            transport.written(),
            vec![
                "RELAY:1:1", "RELAY:1:0", "RELAY:2:1", "RELAY:2:0", "MODE:1", "MODE:2", "MODE:3",
                "MODE:4", "MODE:0", "MODE:2",
            ]
        );
        assert_eq!(authority.current_mode(), Mode::AllOff);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("  ON  response: OK RELAY:1:1"));
        assert!(out.ends_with("Test completed successfully!\n"));
    }

    #[test]
    fn test_stops_at_first_failure() {
        let transport = MockTransport::new()
            .reply(Reply::Line("ok"))
            .reply(Reply::Silence);
        let mut authority = RelayAuthority::new(transport.clone(), 8, DEFAULT_READ_TIMEOUT);
        let mut out = Vec::new();

        let result = run(&mut authority, &no_dwell(), &mut out);

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::TransportError(_))
        ));
        assert_eq!(transport.written(), vec!["RELAY:1:1", "RELAY:1:0"]);
    }
}
