//! Mail sink. Choosing a real MTA configuration is out of scope here, but
//! the send contract is modeled as a trait the boot notifier depends on.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

pub trait MailSink: Send {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Shells out to `sendmail -t`, the traditional Unix MTA contract the
/// original Perl daemon's environment almost certainly assumed.
pub struct SendmailSink {
    pub from: Option<String>,
}

impl MailSink for SendmailSink {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let mut child = Command::new("sendmail")
            .arg("-t")
            .stdin(Stdio::piped())
            .spawn()
            .context("failed to spawn sendmail")?;

        let mut stdin = child.stdin.take().context("sendmail stdin unavailable")?;
        if let Some(from) = &self.from {
            writeln!(stdin, "From: {from}")?;
        }
        writeln!(stdin, "To: {to}")?;
        writeln!(stdin, "Subject: {subject}")?;
        writeln!(stdin)?;
        writeln!(stdin, "{body}")?;
        drop(stdin);

        let status = child.wait().context("sendmail did not exit cleanly")?;
        if !status.success() {
            anyhow::bail!("sendmail exited with {status}");
        }
        Ok(())
    }
}

/// Used whenever `send-mail = never` and in tests.
#[derive(Default)]
pub struct NullSink;

impl MailSink for NullSink {
    fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl MailSink for RecordingSink {
        fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }
}
