//! `nanowatchdogd-board`: a hosted stand-in for the microcontroller half
//! of the NanoWatchdog wire protocol. Talks the identical line protocol a
//! real board would over whatever serial device it is pointed at — a
//! real UART, a USB-CDC adapter, or (in tests) a PTY pair — so nothing on
//! the supervisor side can tell the difference.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nanowatchdog_board::{channel::StreamLineChannel, tick, BoardState, LoggingActuator, SystemClock};

/// Main loop interval: nothing requires a particular board poll rate,
/// only that it never blocks; 50ms keeps CPU use low
/// while staying well under any realistic `delay`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "nanowatchdogd-board", version, about = "NanoWatchdog board firmware simulator")]
struct Cli {
    /// Serial device to listen on (e.g. /dev/ttyUSB0 or a PTY path).
    #[arg(long)]
    device: String,

    /// Baud rate for the serial device.
    #[arg(long, default_value_t = 19200)]
    baudrate: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_thread_ids(true).with_thread_names(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nanowatchdogd_board=debug")),
        )
        .init();

    let cli = Cli::parse();
    info!(device = %cli.device, baudrate = cli.baudrate, "opening serial device");

    let port = serialport::new(&cli.device, cli.baudrate)
        .timeout(Duration::from_millis(50))
        .open()
        .with_context(|| format!("failed to open serial device {}", cli.device))?;

    let mut channel = StreamLineChannel::new(port);
    let mut state = BoardState::new(env!("CARGO_PKG_VERSION"));
    let mut clock = SystemClock::new();
    let mut actuator = LoggingActuator;

    info!("board ready");
    loop {
        if let Err(e) = tick(&mut channel, &mut state, &mut clock, &mut actuator) {
            warn!(error = %e, "serial I/O error, continuing");
        }
        thread::sleep(POLL_INTERVAL);
    }
}
