//! The three status LEDs and the reset relay. Hardware-independent: the
//! reference target drives real GPIO pins, a simulated or desk-tested
//! board logs the transition instead. Both share this one trait so the
//! interpreter and watchdog logic never know which they are driving.

use std::thread;
use std::time::Duration;

use tracing::info;

/// Duration the relay is held closed on a real reset firing.
pub const RELAY_PULSE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Start,
    Ping,
    Reset,
}

pub trait Actuator: Send {
    fn set_led(&mut self, led: Led, on: bool);
    /// Drive the relay high for `RELAY_PULSE`, then low again.
    fn pulse_relay(&mut self);
}

/// Logs every transition instead of touching real GPIO. This is the
/// actuator used by the `nanowatchdogd-board` binary: the board is
/// hardware-independent by design, so "the actuator" here is
/// the boundary a real deployment swaps for GPIO writes.
#[derive(Default)]
pub struct LoggingActuator;

impl Actuator for LoggingActuator {
    fn set_led(&mut self, led: Led, on: bool) {
        info!(?led, on, "led");
    }

    fn pulse_relay(&mut self) {
        info!("relay: closing reset contact");
        thread::sleep(RELAY_PULSE);
        info!("relay: reset contact open");
    }
}

/// Records every call without touching the clock or logging; used by
/// unit tests that assert on exactly what the watchdog drove.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct RecordingActuator {
    pub led_events: Vec<(Led, bool)>,
    pub relay_pulses: usize,
}

#[cfg(any(test, feature = "test-support"))]
impl Actuator for RecordingActuator {
    fn set_led(&mut self, led: Led, on: bool) {
        self.led_events.push((led, on));
    }

    fn pulse_relay(&mut self) {
        self.relay_pulses += 1;
    }
}
