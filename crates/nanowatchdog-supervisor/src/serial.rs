//! Framed request/reply over the USB-attached serial bus.
//! `send` writes one line and reads back whatever accumulates before the
//! line goes quiet for `read-timeout` consecutive ~100ms polls — the
//! supervisor never waits indefinitely for a board that stops answering.

use std::io::{self, Read, Write};
use std::time::Duration;

const POLL_QUANTUM: Duration = Duration::from_millis(100);

pub trait SerialTransport: Send {
    /// Write `line + '\n'` and return the accumulated reply with any
    /// trailing `\r\n` trimmed.
    fn send(&mut self, line: &str) -> io::Result<String>;

    /// Downcast support so tests holding a `Box<dyn SerialTransport>` can
    /// inspect a `FakeSerialTransport`'s recorded calls.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Wraps any byte stream opened at the configured baud. In production
/// this is a `Box<dyn serialport::SerialPort>`; in tests it can be a PTY
/// end or an in-process duplex pipe — anything `Read + Write`.
pub struct StreamSerialTransport<S> {
    stream: S,
    read_timeout_polls: u32,
    scratch: [u8; 4096],
}

impl<S: Read + Write> StreamSerialTransport<S> {
    pub fn new(stream: S, read_timeout_polls: u32) -> Self {
        StreamSerialTransport {
            stream,
            read_timeout_polls,
            scratch: [0u8; 4096],
        }
    }
}

impl<S: Read + Write + Send + 'static> SerialTransport for StreamSerialTransport<S> {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn send(&mut self, line: &str) -> io::Result<String> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;

        let mut buf = Vec::new();
        let mut idle_polls = 0u32;
        loop {
            match self.stream.read(&mut self.scratch) {
                Ok(0) => idle_polls += 1,
                Ok(n) => {
                    buf.extend_from_slice(&self.scratch[..n]);
                    idle_polls = 0;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    idle_polls += 1;
                }
                Err(e) => return Err(e),
            }
            if idle_polls >= self.read_timeout_polls {
                break;
            }
        }

        let text = String::from_utf8_lossy(&buf).into_owned();
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        Ok(text.to_string())
    }
}

/// Stand-in used when `--noserial` disables the serial layer: echoes the
/// request back prefixed, rather than talking to a board.
#[derive(Default)]
pub struct DisabledSerialTransport;

impl SerialTransport for DisabledSerialTransport {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn send(&mut self, line: &str) -> io::Result<String> {
        Ok(format!("DISABLED: {line}"))
    }
}

/// Open the real serial device at `path`/`baud`, with `~100ms` native
/// read timeout so the transport's own polling loop paces correctly.
pub fn open_real(path: &str, baud: u32) -> Result<Box<dyn serialport::SerialPort>, serialport::Error> {
    serialport::new(path, baud)
        .timeout(POLL_QUANTUM)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .dtr_on_open(false)
        .open()
}

/// Send `NOOP` repeatedly until `OK: NOOP` is received or `open_timeout`
/// elapses.
pub fn await_handshake(
    transport: &mut dyn SerialTransport,
    open_timeout: Duration,
) -> bool {
    let start = std::time::Instant::now();
    loop {
        if let Ok(reply) = transport.send("NOOP") {
            if reply == "OK: NOOP" {
                return true;
            }
        }
        if start.elapsed() >= open_timeout {
            return false;
        }
    }
}

/// The startup board configuration sequence, in order.
pub fn configure_board(
    transport: &mut dyn SerialTransport,
    test_mode_on: bool,
    host_epoch: i64,
    delay: u16,
) -> io::Result<()> {
    transport.send(if test_mode_on { "SET TEST ON" } else { "SET TEST OFF" })?;
    transport.send(&format!("SET DATE {host_epoch}"))?;
    transport.send(&format!("SET DELAY {delay}"))?;
    transport.send("START")?;
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted serial transport for unit tests: echoes `OK: <cmd>` by
    /// default, or returns a queued canned reply if one is pending.
    pub struct FakeSerialTransport {
        pub sent: Vec<String>,
        pub canned: VecDeque<String>,
    }

    impl Default for FakeSerialTransport {
        fn default() -> Self {
            FakeSerialTransport {
                sent: Vec::new(),
                canned: VecDeque::new(),
            }
        }
    }

    impl FakeSerialTransport {
        pub fn queue_reply(&mut self, reply: impl Into<String>) {
            self.canned.push_back(reply.into());
        }
    }

    impl SerialTransport for FakeSerialTransport {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn send(&mut self, line: &str) -> io::Result<String> {
            self.sent.push(line.to_string());
            if let Some(reply) = self.canned.pop_front() {
                return Ok(reply);
            }
            Ok(format!("OK: {line}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSerialTransport;
    use super::*;

    #[test]
    fn handshake_succeeds_once_ok_noop_seen() {
        let mut t = FakeSerialTransport::default();
        assert!(await_handshake(&mut t, Duration::from_millis(50)));
        assert_eq!(t.sent, vec!["NOOP".to_string()]);
    }

    #[test]
    fn handshake_times_out_if_board_silent() {
        struct Silent;
        impl SerialTransport for Silent {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn send(&mut self, _line: &str) -> io::Result<String> {
                Ok(String::new())
            }
        }
        let mut t = Silent;
        assert!(!await_handshake(&mut t, Duration::from_millis(30)));
    }

    #[test]
    fn disabled_transport_echoes_with_prefix() {
        let mut t = DisabledSerialTransport;
        assert_eq!(t.send("PING").unwrap(), "DISABLED: PING");
    }

    #[test]
    fn configure_board_sends_canonical_sequence() {
        let mut t = FakeSerialTransport::default();
        configure_board(&mut t, false, 1_700_000_000, 60).unwrap();
        assert_eq!(
            t.sent,
            vec![
                "SET TEST OFF".to_string(),
                "SET DATE 1700000000".to_string(),
                "SET DELAY 60".to_string(),
                "START".to_string(),
            ]
        );
    }
}
