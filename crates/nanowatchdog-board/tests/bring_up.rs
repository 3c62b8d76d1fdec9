//! End-to-end scenarios driven over the board's line channel: a clean
//! boot, a watchdog-triggered reset, and a test-mode reset.

use nanowatchdog_board::channel::{DuplexEnd, StreamLineChannel};
use nanowatchdog_board::clock::FakeClock;
use nanowatchdog_board::{tick, BoardState, LoggingActuator};

struct Harness {
    board: StreamLineChannel<DuplexEnd>,
    driver: DuplexEnd,
    state: BoardState,
    clock: FakeClock,
    actuator: LoggingActuator,
}

impl Harness {
    fn new() -> Self {
        let (board_end, driver_end) = DuplexEnd::pair();
        Harness {
            board: StreamLineChannel::new(board_end),
            driver: driver_end,
            state: BoardState::new("test-fw"),
            clock: FakeClock::new(1_700_000_000),
            actuator: LoggingActuator,
        }
    }

    /// Send one command and pump the board until its reply line arrives.
    fn command(&mut self, line: &str) -> Vec<String> {
        use std::io::{Read, Write};
        self.driver.write_all(line.as_bytes()).unwrap();
        self.driver.write_all(b"\n").unwrap();

        let mut replies = Vec::new();
        loop {
            tick(&mut self.board, &mut self.state, &mut self.clock, &mut self.actuator).unwrap();
            let mut buf = [0u8; 4096];
            match self.driver.read(&mut buf) {
                Ok(n) if n > 0 => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    for l in text.split('\n').filter(|l| !l.is_empty()) {
                        replies.push(l.trim_end_matches('\r').to_string());
                    }
                    if replies.last().map(|l| l.starts_with("OK:") || l.starts_with("Unknown")).unwrap_or(false) {
                        break;
                    }
                }
                _ => continue,
            }
        }
        replies
    }
}

#[test]
fn empty_board_bring_up_fires_reset_after_delay() {
    let mut h = Harness::new();

    assert_eq!(h.command("NOOP"), vec!["OK: NOOP"]);
    assert_eq!(h.command("EEPROM INIT"), vec!["OK: EEPROM INIT"]);
    assert_eq!(h.command("SET DATE 1700000000"), vec!["OK: SET DATE 1700000000"]);
    assert_eq!(h.command("SET DELAY 60"), vec!["OK: SET DELAY 60"]);
    assert_eq!(h.command("SET TEST OFF"), vec!["OK: SET TEST OFF"]);
    assert_eq!(h.command("START"), vec!["OK: START"]);

    h.clock.advance(61);
    tick(&mut h.board, &mut h.state, &mut h.clock, &mut h.actuator).unwrap();

    assert_ne!(h.state.reset_time, 0);
    let rec = h.state.store.read_slot(0);
    assert_eq!(rec.reason, nanowatchdog_proto::command::REASON_MISSED_PING);
    assert_eq!(rec.time, 1_700_000_061);
    assert!(!rec.acknowledged);
}

#[test]
fn ping_sustains_across_the_delay_window() {
    let mut h = Harness::new();
    h.command("EEPROM INIT");
    h.command("SET DATE 1700000000");
    h.command("SET DELAY 60");
    h.command("SET TEST ON");
    h.command("START");

    for _ in 0..15 {
        h.clock.advance(20);
        h.command("PING");
    }

    assert_eq!(h.state.reset_time, 0);
    assert_eq!(h.state.store.count(), 0);
}

#[test]
fn external_reboot_persists_event_and_replies_ok() {
    let mut h = Harness::new();
    h.command("EEPROM INIT");
    h.command("SET DATE 1700000000");
    h.command("SET TEST OFF");
    h.command("START");

    assert_eq!(h.command("REBOOT 22"), vec!["OK: REBOOT 22"]);
    let rec = h.state.store.read_slot(0);
    assert_eq!(rec.reason, 22);
    assert!(!rec.acknowledged);
}
