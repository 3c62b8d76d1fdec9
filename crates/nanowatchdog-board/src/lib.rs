//! Board firmware simulation: the command interpreter, watchdog timer,
//! event store and actuator that stand in for the microcontroller half of
//! the wire protocol. Exposed as a library so the supervisor's end-to-end
//! tests can drive a board over an in-process duplex pipe without
//! spawning the `nanowatchdogd-board` binary.

pub mod actuator;
pub mod channel;
pub mod clock;
pub mod interpreter;
pub mod state;

pub use actuator::{Actuator, Led, LoggingActuator};
pub use channel::{LineChannel, StreamLineChannel};
#[cfg(any(test, feature = "test-support"))]
pub use channel::DuplexEnd;
pub use clock::{Clock, SystemClock};
pub use state::BoardState;

/// Run one main-loop pass: dispatch at most one buffered line, then
/// evaluate the watchdog condition. Never blocks.
pub fn tick(
    channel: &mut dyn LineChannel,
    state: &mut BoardState,
    clock: &mut dyn Clock,
    actuator: &mut dyn Actuator,
) -> std::io::Result<()> {
    if let Some(line) = channel.poll_line()? {
        for reply in interpreter::dispatch(&line, state, clock, actuator) {
            channel.write_line(&reply)?;
        }
    }
    if state.watchdog_expired(clock.now()) {
        state.fire_missed_ping_reset(clock.now(), actuator);
    }
    Ok(())
}
