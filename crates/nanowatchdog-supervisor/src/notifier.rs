//! Boot-time notifier: inspects the board's startup STATUS
//! reply and, depending on `send-mail` policy, emails an operator and/or
//! acknowledges the last reset event.

use anyhow::Result;

use crate::config::SendMailPolicy;
use crate::mail::MailSink;
use crate::serial::SerialTransport;

/// Board STATUS replies use these line-prefixes verbatim; the
/// host parses by prefix match, not by full-line equality, so leading
/// whitespace from the board's indentation is tolerated.
fn find_prefixed<'a>(status_text: &'a str, prefix: &str) -> Option<&'a str> {
    status_text
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with(prefix))
        .map(|l| l[prefix.len()..].trim())
}

/// `true` when the STATUS reply's last reset event is unacknowledged.
/// Absence of an `acknowledged:` line (a board that has never reset) is
/// treated as "acknowledged" — there is nothing to notify about.
fn is_unacknowledged(status_text: &str) -> bool {
    find_prefixed(status_text, "acknowledged:") == Some("no")
}

/// Run the boot notifier against one STATUS reply. `admin` must be
/// `Some` and `send_mail` must not be `Never` for any mail to go out.
pub fn run(
    status_text: &str,
    send_mail: SendMailPolicy,
    admin: Option<&str>,
    mail: &dyn MailSink,
    serial: &mut dyn SerialTransport,
) -> Result<()> {
    let (Some(admin), false) = (admin, send_mail == SendMailPolicy::Never) else {
        return Ok(());
    };

    if is_unacknowledged(status_text) {
        mail.send(admin, "NanoWatchdog: unacknowledged reset event", status_text)?;
        serial.send("ACKNOWLEDGE 0")?;
    } else if send_mail == SendMailPolicy::Always {
        mail.send(
            admin,
            "NanoWatchdog: status check",
            "No unacknowledged reset event on this board.",
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::RecordingSink;
    use crate::serial::fake::FakeSerialTransport;

    const UNACKED_STATUS: &str = "Delay: 60\nStatus: reset\nLast reset:\n  reason: 22 (external command)\n  acknowledged: no\n  time: 1700000060\n";
    const ACKED_STATUS: &str = "Delay: 60\nStatus: started\nLast reset:\n  reason: 1 (missed ping)\n  acknowledged: yes\n  time: 1700000000\n";

    #[test]
    fn unacknowledged_event_triggers_mail_and_acknowledge() {
        let mail = RecordingSink::default();
        let mut serial = FakeSerialTransport::default();
        run(
            UNACKED_STATUS,
            SendMailPolicy::Auto,
            Some("ops@example.com"),
            &mail,
            &mut serial,
        )
        .unwrap();

        let sent = mail.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains("reason: 22"));
        assert_eq!(serial.sent, vec!["ACKNOWLEDGE 0".to_string()]);
    }

    #[test]
    fn acknowledged_event_with_auto_sends_nothing() {
        let mail = RecordingSink::default();
        let mut serial = FakeSerialTransport::default();
        run(ACKED_STATUS, SendMailPolicy::Auto, Some("ops@example.com"), &mail, &mut serial).unwrap();
        assert!(mail.sent.lock().unwrap().is_empty());
        assert!(serial.sent.is_empty());
    }

    #[test]
    fn acknowledged_event_with_always_sends_short_mail() {
        let mail = RecordingSink::default();
        let mut serial = FakeSerialTransport::default();
        run(ACKED_STATUS, SendMailPolicy::Always, Some("ops@example.com"), &mail, &mut serial).unwrap();
        let sent = mail.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].2.contains("reason:"));
    }

    #[test]
    fn never_policy_suppresses_all_mail() {
        let mail = RecordingSink::default();
        let mut serial = FakeSerialTransport::default();
        run(UNACKED_STATUS, SendMailPolicy::Never, Some("ops@example.com"), &mail, &mut serial).unwrap();
        assert!(mail.sent.lock().unwrap().is_empty());
        assert!(serial.sent.is_empty());
    }

    #[test]
    fn no_admin_suppresses_all_mail() {
        let mail = RecordingSink::default();
        let mut serial = FakeSerialTransport::default();
        run(UNACKED_STATUS, SendMailPolicy::Auto, None, &mail, &mut serial).unwrap();
        assert!(mail.sent.lock().unwrap().is_empty());
    }
}
