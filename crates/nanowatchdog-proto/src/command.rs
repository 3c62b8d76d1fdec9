//! Board command set: the tagged sum parsed from one line of the serial
//! wire protocol, and the textual reply framing shared by both ends.

use std::fmt;

use crate::ProtocolError;

/// Lowest reason code a caller other than the firmware itself may use.
pub const REASON_CALLER_MIN: u8 = 16;
/// Highest representable reason code (packed into 7 bits).
pub const REASON_CALLER_MAX: u8 = 127;

pub const REASON_INIT: u8 = 0;
pub const REASON_MISSED_PING: u8 = 1;
pub const REASON_LOAD_1: u8 = 16;
pub const REASON_LOAD_5: u8 = 17;
pub const REASON_LOAD_15: u8 = 18;
pub const REASON_MIN_MEMORY: u8 = 19;
pub const REASON_MAX_TEMPERATURE: u8 = 20;
pub const REASON_PIDFILE: u8 = 21;
pub const REASON_PING: u8 = 22;
pub const REASON_INTERFACE: u8 = 23;

/// Human-readable label for a reason code, used in `STATUS`/`EEPROM DUMP`
/// output and by the supervisor's boot notifier mail body.
pub fn reason_label(reason: u8) -> &'static str {
    match reason {
        REASON_INIT => "initialization",
        REASON_MISSED_PING => "missed ping",
        REASON_LOAD_1 => "load average (1 min)",
        REASON_LOAD_5 => "load average (5 min)",
        REASON_LOAD_15 => "load average (15 min)",
        REASON_MIN_MEMORY => "low memory",
        REASON_MAX_TEMPERATURE => "over temperature",
        REASON_PIDFILE => "pid-file check failed",
        REASON_PING => "network ping failed",
        REASON_INTERFACE => "interface counters idle",
        2..=15 => "reserved",
        _ => "external command",
    }
}

/// Minimum accepted `SET DELAY` value.
pub const DELAY_MIN: u32 = 1;
/// Maximum accepted `SET DELAY` value.
pub const DELAY_MAX: u32 = 65535;

/// One fully parsed board command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Noop,
    Help,
    Ping,
    Start,
    Stop,
    Reinit,
    SetDate(u32),
    SetDelay(u16),
    SetTest(bool),
    Reboot(u8),
    Acknowledge(u8),
    EepromInit,
    EepromDump,
    Status,
}

impl Command {
    /// Parse one already-trimmed-of-`\n` line into a command.
    ///
    /// Tokenization is a single space; any empty token (double space, or
    /// leading/trailing space) invalidates the line.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(ProtocolError::Malformed(line.to_string()));
        }
        match tokens.as_slice() {
            ["NOOP"] => Ok(Command::Noop),
            ["HELP"] => Ok(Command::Help),
            ["PING"] => Ok(Command::Ping),
            ["START"] => Ok(Command::Start),
            ["STOP"] => Ok(Command::Stop),
            ["REINIT"] => Ok(Command::Reinit),
            ["STATUS"] => Ok(Command::Status),
            ["SET", "DATE", v] => {
                let epoch: u32 = v
                    .parse()
                    .map_err(|_| ProtocolError::Malformed(line.to_string()))?;
                Ok(Command::SetDate(epoch))
            }
            ["SET", "DELAY", v] => {
                let n: u32 = v
                    .parse()
                    .map_err(|_| ProtocolError::Malformed(line.to_string()))?;
                if n < DELAY_MIN || n > DELAY_MAX {
                    return Err(ProtocolError::ArgumentOutOfRange(line.to_string()));
                }
                Ok(Command::SetDelay(n as u16))
            }
            ["SET", "TEST", "ON"] => Ok(Command::SetTest(true)),
            ["SET", "TEST", "OFF"] => Ok(Command::SetTest(false)),
            ["REBOOT", v] => {
                let r: u32 = v
                    .parse()
                    .map_err(|_| ProtocolError::Malformed(line.to_string()))?;
                if !(REASON_CALLER_MIN as u32..=REASON_CALLER_MAX as u32).contains(&r) {
                    return Err(ProtocolError::ArgumentOutOfRange(line.to_string()));
                }
                Ok(Command::Reboot(r as u8))
            }
            ["ACKNOWLEDGE", v] => {
                let i: i32 = v
                    .parse()
                    .map_err(|_| ProtocolError::Malformed(line.to_string()))?;
                if !(0..=9).contains(&i) {
                    return Err(ProtocolError::ArgumentOutOfRange(line.to_string()));
                }
                Ok(Command::Acknowledge(i as u8))
            }
            ["EEPROM", "INIT"] => Ok(Command::EepromInit),
            ["EEPROM", "DUMP"] => Ok(Command::EepromDump),
            _ => Err(ProtocolError::UnknownCommand(line.to_string())),
        }
    }
}

impl fmt::Display for Command {
    /// Re-render a command the way it was received, so `OK: <cmd>` /
    /// `Unknown or invalid command: <cmd>` can echo it verbatim. Used only
    /// when the caller built a `Command` programmatically rather than
    /// parsing a line (e.g. the supervisor's internal `REBOOT` call); the
    /// board's own dispatcher always echoes the original line text, not
    /// this rendering, to guarantee byte-exact echo of whitespace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Noop => write!(f, "NOOP"),
            Command::Help => write!(f, "HELP"),
            Command::Ping => write!(f, "PING"),
            Command::Start => write!(f, "START"),
            Command::Stop => write!(f, "STOP"),
            Command::Reinit => write!(f, "REINIT"),
            Command::SetDate(v) => write!(f, "SET DATE {v}"),
            Command::SetDelay(v) => write!(f, "SET DELAY {v}"),
            Command::SetTest(true) => write!(f, "SET TEST ON"),
            Command::SetTest(false) => write!(f, "SET TEST OFF"),
            Command::Reboot(r) => write!(f, "REBOOT {r}"),
            Command::Acknowledge(i) => write!(f, "ACKNOWLEDGE {i}"),
            Command::EepromInit => write!(f, "EEPROM INIT"),
            Command::EepromDump => write!(f, "EEPROM DUMP"),
            Command::Status => write!(f, "STATUS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(Command::parse("NOOP").unwrap(), Command::Noop);
        assert_eq!(Command::parse("PING").unwrap(), Command::Ping);
        assert_eq!(Command::parse("STATUS").unwrap(), Command::Status);
    }

    #[test]
    fn rejects_double_space_and_trailing_space() {
        assert!(Command::parse("PING ").is_err());
        assert!(Command::parse("SET  DELAY 5").is_err());
        assert!(Command::parse(" PING").is_err());
    }

    #[test]
    fn set_delay_bounds() {
        assert!(Command::parse("SET DELAY 0").is_err());
        assert!(Command::parse("SET DELAY 65536").is_err());
        assert_eq!(
            Command::parse("SET DELAY 1").unwrap(),
            Command::SetDelay(1)
        );
        assert_eq!(
            Command::parse("SET DELAY 65535").unwrap(),
            Command::SetDelay(65535)
        );
    }

    #[test]
    fn reboot_bounds() {
        assert!(Command::parse("REBOOT 15").is_err());
        assert!(Command::parse("REBOOT 128").is_err());
        assert_eq!(Command::parse("REBOOT 16").unwrap(), Command::Reboot(16));
        assert_eq!(Command::parse("REBOOT 127").unwrap(), Command::Reboot(127));
    }

    #[test]
    fn acknowledge_bounds() {
        assert!(Command::parse("ACKNOWLEDGE -1").is_err());
        assert!(Command::parse("ACKNOWLEDGE 10").is_err());
        assert_eq!(
            Command::parse("ACKNOWLEDGE 0").unwrap(),
            Command::Acknowledge(0)
        );
        assert_eq!(
            Command::parse("ACKNOWLEDGE 9").unwrap(),
            Command::Acknowledge(9)
        );
    }

    #[test]
    fn set_test_requires_exact_token() {
        assert_eq!(
            Command::parse("SET TEST ON").unwrap(),
            Command::SetTest(true)
        );
        assert!(Command::parse("SET TEST on").is_err());
        assert!(Command::parse("SET TEST MAYBE").is_err());
    }

    #[test]
    fn eeprom_commands() {
        assert_eq!(Command::parse("EEPROM INIT").unwrap(), Command::EepromInit);
        assert_eq!(Command::parse("EEPROM DUMP").unwrap(), Command::EepromDump);
        assert!(Command::parse("EEPROM INIT EXTRA").is_err());
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            Command::parse("BOGUS"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }
}
