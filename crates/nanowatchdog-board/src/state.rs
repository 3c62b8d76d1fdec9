//! The board's runtime state: three timestamps, the test-mode and
//! date-set flags, the configured delay, and the persisted event store.
//! Owned exclusively by the single command-interpreter/watchdog loop.

use nanowatchdog_proto::{command::REASON_MISSED_PING, event::EventRecord, store::EventStore};

use crate::actuator::{Actuator, Led};
use crate::clock::Clock;

pub const DEFAULT_DELAY: u16 = 60;

pub struct BoardState {
    pub firmware_version: String,
    pub start_time: i32,
    pub last_ping: i32,
    pub reset_time: i32,
    pub test_mode: bool,
    pub date_set: bool,
    pub delay: u16,
    pub store: EventStore,
}

impl BoardState {
    pub fn new(firmware_version: impl Into<String>) -> Self {
        let firmware_version = firmware_version.into();
        let mut store = EventStore::new();
        store.init(&firmware_version, 0);
        BoardState {
            firmware_version,
            start_time: 0,
            last_ping: 0,
            reset_time: 0,
            test_mode: false,
            date_set: false,
            delay: DEFAULT_DELAY,
            store,
        }
    }

    /// `START`: idempotent — only takes effect the first time.
    pub fn start(&mut self, now: i32, actuator: &mut dyn Actuator) {
        if self.start_time == 0 {
            self.start_time = now;
            self.last_ping = now;
            actuator.set_led(Led::Start, true);
        }
    }

    /// `STOP` / `REINIT`: clear the start/reset timestamps together.
    pub fn stop(&mut self, actuator: &mut dyn Actuator) {
        self.start_time = 0;
        self.reset_time = 0;
        self.last_ping = 0;
        actuator.set_led(Led::Start, false);
        actuator.set_led(Led::Reset, false);
    }

    /// `PING`: gated on the watchdog being armed and not already reset.
    pub fn ping(&mut self, now: i32, actuator: &mut dyn Actuator) -> bool {
        if self.start_time == 0 || self.reset_time != 0 {
            return false;
        }
        self.last_ping = now;
        actuator.set_led(Led::Ping, true);
        true
    }

    /// True when the watchdog is armed, unfired, and the ping has gone
    /// silent for longer than `delay`.
    pub fn watchdog_expired(&self, now: i32) -> bool {
        self.start_time != 0
            && self.reset_time == 0
            && now > self.last_ping + self.delay as i32
    }

    /// Fire a reset. One-shot: a no-op if already reset. In test mode the
    /// relay never pulses and no event is persisted, but the RESET LED
    /// still lights and `reset_time` is still latched: test mode means
    /// no relay pulse and no persisted event, not "nothing happened".
    pub fn fire_reset(&mut self, now: i32, reason: u8, actuator: &mut dyn Actuator) -> bool {
        if self.reset_time != 0 {
            return false;
        }
        self.reset_time = now;
        actuator.set_led(Led::Reset, true);
        if !self.test_mode {
            let rec = EventRecord::reset(&self.firmware_version, now, reason);
            self.store.push_reset(rec);
            actuator.pulse_relay();
        }
        true
    }

    /// Convenience for the watchdog-condition path (reason 1).
    pub fn fire_missed_ping_reset(&mut self, now: i32, actuator: &mut dyn Actuator) -> bool {
        self.fire_reset(now, REASON_MISSED_PING, actuator)
    }

    pub fn seconds_until_reset(&self, now: i32) -> Option<i32> {
        if self.start_time == 0 || self.reset_time != 0 {
            None
        } else {
            Some(self.last_ping + self.delay as i32 - now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingActuator;

    fn state() -> BoardState {
        BoardState::new("test-fw")
    }

    #[test]
    fn start_is_idempotent() {
        let mut s = state();
        let mut act = RecordingActuator::default();
        s.start(100, &mut act);
        s.start(200, &mut act);
        assert_eq!(s.start_time, 100);
        assert_eq!(s.last_ping, 100);
    }

    #[test]
    fn ping_gated_before_start() {
        let mut s = state();
        let mut act = RecordingActuator::default();
        assert!(!s.ping(100, &mut act));
    }

    #[test]
    fn watchdog_fires_after_delay_elapses() {
        let mut s = state();
        s.delay = 60;
        let mut act = RecordingActuator::default();
        s.start(1000, &mut act);
        assert!(!s.watchdog_expired(1060));
        assert!(s.watchdog_expired(1061));
    }

    #[test]
    fn reset_is_one_shot() {
        let mut s = state();
        let mut act = RecordingActuator::default();
        s.start(0, &mut act);
        assert!(s.fire_missed_ping_reset(100, &mut act));
        assert!(!s.fire_missed_ping_reset(200, &mut act));
        assert_eq!(s.reset_time, 100);
    }

    #[test]
    fn test_mode_suppresses_relay_and_event() {
        let mut s = state();
        s.test_mode = true;
        let mut act = RecordingActuator::default();
        s.start(0, &mut act);
        s.fire_missed_ping_reset(100, &mut act);
        assert_eq!(act.relay_pulses, 0);
        assert_eq!(s.store.count(), 0);
        assert!(act
            .led_events
            .iter()
            .any(|(led, on)| *led == Led::Reset && *on));
    }

    #[test]
    fn reboot_persists_event_with_given_reason() {
        let mut s = state();
        let mut act = RecordingActuator::default();
        s.start(0, &mut act);
        s.fire_reset(50, 22, &mut act);
        assert_eq!(s.store.count(), 1);
        let rec = s.store.read_slot(0);
        assert_eq!(rec.reason, 22);
        assert!(!rec.acknowledged);
    }
}
