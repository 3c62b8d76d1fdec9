//! Dispatches one parsed `Command` against the board's runtime state and
//! renders the reply lines (any multi-line output, followed by the
//! `OK:`/`Unknown or invalid command:` acknowledgement).

use nanowatchdog_proto::{command, ok_reply, store::RING_SLOTS, Command};

use crate::actuator::Actuator;
use crate::clock::Clock;
use crate::state::BoardState;

const HELP_TEXT: &[&str] = &[
    "Commands: NOOP HELP PING START STOP REINIT SET DATE <epoch>",
    "SET DELAY <1..65535> SET TEST ON|OFF REBOOT <16..127>",
    "ACKNOWLEDGE <0..9> EEPROM INIT EEPROM DUMP STATUS",
];

/// Handle one already-framed line (no trailing `\n`). Returns the full
/// reply, including the terminating acknowledgement line.
pub fn dispatch(
    line: &str,
    state: &mut BoardState,
    clock: &mut dyn Clock,
    actuator: &mut dyn Actuator,
) -> Vec<String> {
    match Command::parse(line) {
        Ok(cmd) => {
            let mut out = execute(&cmd, state, clock, actuator);
            out.push(ok_reply(line));
            out
        }
        Err(_) => vec![nanowatchdog_proto::invalid_reply(line)],
    }
}

fn execute(
    cmd: &Command,
    state: &mut BoardState,
    clock: &mut dyn Clock,
    actuator: &mut dyn Actuator,
) -> Vec<String> {
    match cmd {
        Command::Noop => vec![],
        Command::Help => HELP_TEXT.iter().map(|s| s.to_string()).collect(),
        Command::Ping => {
            state.ping(clock.now(), actuator);
            vec![]
        }
        Command::Start => {
            state.start(clock.now(), actuator);
            vec![]
        }
        Command::Stop | Command::Reinit => {
            state.stop(actuator);
            vec![]
        }
        Command::SetDate(epoch) => {
            clock.set(*epoch as i32);
            state.date_set = true;
            vec![]
        }
        Command::SetDelay(n) => {
            state.delay = *n;
            vec![]
        }
        Command::SetTest(on) => {
            state.test_mode = *on;
            vec![]
        }
        Command::Reboot(reason) => {
            state.fire_reset(clock.now(), *reason, actuator);
            vec![]
        }
        Command::Acknowledge(i) => {
            let _ = state.store.acknowledge(*i as usize);
            vec![]
        }
        Command::EepromInit => {
            state.store.init(&state.firmware_version.clone(), clock.now());
            vec![]
        }
        Command::EepromDump => dump_lines(state),
        Command::Status => status_lines(state, clock.now()),
    }
}

fn dump_lines(state: &BoardState) -> Vec<String> {
    let mut lines = Vec::new();
    let init = state.store.read_init();
    lines.push(format!(
        "init: reason: {} acknowledged: {} time: {}",
        init.reason,
        yes_no(init.acknowledged),
        init.time
    ));
    lines.push(format!("count: {}", state.store.count()));
    for i in 0..RING_SLOTS {
        let rec = state.store.read_slot(i);
        lines.push(format!(
            "slot {}: reason: {} acknowledged: {} time: {}",
            i,
            rec.reason,
            yes_no(rec.acknowledged),
            rec.time
        ));
    }
    lines
}

fn status_lines(state: &BoardState, now: i32) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("Delay: {}", state.delay));
    lines.push(format!("Test: {}", if state.test_mode { "on" } else { "off" }));
    lines.push(format!("Date set: {}", yes_no(state.date_set)));

    let status_word = if state.reset_time != 0 {
        "reset"
    } else if state.start_time != 0 {
        "started"
    } else {
        "stopped"
    };
    lines.push(format!("Status: {status_word}"));
    lines.push(format!("Start time: {}", state.start_time));
    lines.push(format!("Last ping: {}", state.last_ping));
    lines.push(format!("Reset time: {}", state.reset_time));
    match state.seconds_until_reset(now) {
        Some(secs) => lines.push(format!("Seconds left: {secs}")),
        None => lines.push("Seconds left: n/a".to_string()),
    }

    let last = state.store.read_slot(0);
    lines.push("Last reset:".to_string());
    lines.push(format!(
        "  reason: {} ({})",
        last.reason,
        command::reason_label(last.reason)
    ));
    lines.push(format!("  acknowledged: {}", yes_no(last.acknowledged)));
    lines.push(format!("  time: {}", last.time));
    lines
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingActuator;
    use crate::clock::FakeClock;

    fn fixture() -> (BoardState, FakeClock, RecordingActuator) {
        (
            BoardState::new("1.0.0-test"),
            FakeClock::new(1_700_000_000),
            RecordingActuator::default(),
        )
    }

    #[test]
    fn noop_acknowledges_only() {
        let (mut s, mut c, mut a) = fixture();
        let out = dispatch("NOOP", &mut s, &mut c, &mut a);
        assert_eq!(out, vec!["OK: NOOP".to_string()]);
    }

    #[test]
    fn invalid_command_leaves_state_untouched() {
        let (mut s, mut c, mut a) = fixture();
        let before = s.delay;
        let out = dispatch("SET DELAY 0", &mut s, &mut c, &mut a);
        assert_eq!(out, vec!["Unknown or invalid command: SET DELAY 0".to_string()]);
        assert_eq!(s.delay, before);
    }

    #[test]
    fn set_date_moves_clock_and_marks_date_set() {
        let (mut s, mut c, mut a) = fixture();
        dispatch("SET DATE 1700000000", &mut s, &mut c, &mut a);
        assert!(s.date_set);
        assert_eq!(c.now(), 1_700_000_000);
    }

    #[test]
    fn bring_up_scenario_fires_missed_ping_reset_after_delay() {
        let (mut s, mut c, mut a) = fixture();
        dispatch("EEPROM INIT", &mut s, &mut c, &mut a);
        dispatch("SET DATE 1700000000", &mut s, &mut c, &mut a);
        dispatch("SET DELAY 60", &mut s, &mut c, &mut a);
        dispatch("SET TEST OFF", &mut s, &mut c, &mut a);
        dispatch("START", &mut s, &mut c, &mut a);
        assert_eq!(s.store.count(), 0);

        c.advance(61);
        assert!(s.watchdog_expired(c.now()));
        s.fire_missed_ping_reset(c.now(), &mut a);

        let status = status_lines(&s, c.now());
        assert!(status.contains(&"Status: reset".to_string()));
        let rec = s.store.read_slot(0);
        assert_eq!(rec.reason, nanowatchdog_proto::command::REASON_MISSED_PING);
        assert!(!rec.acknowledged);
        assert_eq!(rec.time, 1_700_000_061);
    }

    #[test]
    fn status_carries_acknowledged_and_reason_labels_verbatim() {
        let (mut s, mut c, mut a) = fixture();
        dispatch("EEPROM INIT", &mut s, &mut c, &mut a);
        dispatch("START", &mut s, &mut c, &mut a);
        dispatch("REBOOT 22", &mut s, &mut c, &mut a);
        let lines = status_lines(&s, c.now());
        assert!(lines.iter().any(|l| l.trim() == "reason: 22 (network ping failed)"));
        assert!(lines.iter().any(|l| l.trim() == "acknowledged: no"));
    }

    #[test]
    fn eeprom_dump_lists_all_slots() {
        let (mut s, mut c, mut a) = fixture();
        dispatch("EEPROM INIT", &mut s, &mut c, &mut a);
        let lines = dump_lines(&s);
        assert_eq!(lines.len(), 2 + RING_SLOTS);
    }
}
