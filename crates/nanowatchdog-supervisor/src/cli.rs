//! Long-options-only CLI surface. Invocation with zero
//! arguments prints help and exits — `clap`'s `arg_required_else_help`
//! gives us that for free.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "nanowatchdogd",
    version,
    about = "NanoWatchdog host supervisor",
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub daemon: bool,
    #[arg(long = "nodaemon", action = clap::ArgAction::SetTrue)]
    pub no_daemon: bool,

    /// Verbosity: decimal, `0x…` hex, or `0b…` binary.
    #[arg(long)]
    pub verbose: Option<String>,

    #[arg(long, default_value_t = false)]
    pub serial: bool,
    #[arg(long = "noserial", action = clap::ArgAction::SetTrue)]
    pub no_serial: bool,

    #[arg(long)]
    pub device: Option<PathBuf>,
    #[arg(long)]
    pub ip: Option<IpAddr>,

    #[arg(long = "port-daemon")]
    pub port_daemon: Option<u16>,
    #[arg(long = "port-board")]
    pub port_board: Option<u16>,

    #[arg(long)]
    pub delay: Option<u16>,
    #[arg(long)]
    pub interval: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub ping: bool,
    #[arg(long = "noping", action = clap::ArgAction::SetTrue)]
    pub no_ping: bool,

    #[arg(long, default_value_t = false)]
    pub action: bool,
    #[arg(long = "noaction", action = clap::ArgAction::SetTrue)]
    pub no_action: bool,

    #[arg(long, default_value_t = false)]
    pub force: bool,
    #[arg(long = "noforce", action = clap::ArgAction::SetTrue)]
    pub no_force: bool,

    /// Accepted and ignored: no soft-reboot path exists.
    #[arg(long, default_value_t = false)]
    pub softboot: bool,

    /// Accepted and ignored: the original's cross-process sync primitive
    /// has no counterpart in a single cooperative process.
    #[arg(long, default_value_t = false)]
    pub sync: bool,
}

/// Parse `--verbose` as decimal, `0x`-hex, or `0b`-binary — the same
/// grammar `SET VERBOSE` accepts over the command endpoint.
pub fn parse_verbose(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u32::from_str_radix(bin, 2).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hex_and_binary_verbosity() {
        assert_eq!(parse_verbose("7"), Some(7));
        assert_eq!(parse_verbose("0x1F"), Some(31));
        assert_eq!(parse_verbose("0b101"), Some(5));
        assert_eq!(parse_verbose("garbage"), None);
    }
}
