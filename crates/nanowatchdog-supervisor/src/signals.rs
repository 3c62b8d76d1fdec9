//! Signal-driven state transitions: each handler only sets a flag read by
//! the main loop rather than doing work in handler context, which keeps
//! the loop strictly cooperative and avoids the reentrancy hazards of
//! doing I/O inside a signal handler.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

static QUIT: AtomicBool = AtomicBool::new(false);
static HUP: AtomicBool = AtomicBool::new(false);
static USR1: AtomicBool = AtomicBool::new(false);
/// Set alongside `QUIT` by `SIGINT` so the exit code comes out 1.
static INT_SEEN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_term(_: libc::c_int) {
    QUIT.store(true, Ordering::SeqCst);
}

extern "C" fn on_int(_: libc::c_int) {
    INT_SEEN.store(true, Ordering::SeqCst);
    QUIT.store(true, Ordering::SeqCst);
}

extern "C" fn on_hup(_: libc::c_int) {
    HUP.store(true, Ordering::SeqCst);
}

extern "C" fn on_usr1(_: libc::c_int) {
    USR1.store(true, Ordering::SeqCst);
}

/// Install handlers for TERM/INT/HUP/USR1. Safe to call once at startup;
/// QUIT command handling goes through `request_quit`, not a signal.
pub fn install() -> anyhow::Result<()> {
    unsafe {
        signal::sigaction(Signal::SIGTERM, &signal::SigAction::new(SigHandler::Handler(on_term), signal::SaFlags::empty(), signal::SigSet::empty()))?;
        signal::sigaction(Signal::SIGINT, &signal::SigAction::new(SigHandler::Handler(on_int), signal::SaFlags::empty(), signal::SigSet::empty()))?;
        signal::sigaction(Signal::SIGHUP, &signal::SigAction::new(SigHandler::Handler(on_hup), signal::SaFlags::empty(), signal::SigSet::empty()))?;
        signal::sigaction(Signal::SIGUSR1, &signal::SigAction::new(SigHandler::Handler(on_usr1), signal::SaFlags::empty(), signal::SigSet::empty()))?;
    }
    Ok(())
}

pub fn quit_requested() -> bool {
    QUIT.load(Ordering::SeqCst)
}

pub fn exit_code_is_one() -> bool {
    INT_SEEN.load(Ordering::SeqCst)
}

/// `QUIT` TCP command: equivalent to TERM but with exit code 0 — sets
/// the same flag `INT_SEEN` is careful not to touch.
pub fn request_quit() {
    QUIT.store(true, Ordering::SeqCst);
}

pub fn take_hup() -> bool {
    HUP.swap(false, Ordering::SeqCst)
}

pub fn take_usr1() -> bool {
    USR1.swap(false, Ordering::SeqCst)
}

/// Test-only: clear the quit flag so one test's `QUIT` doesn't leak into
/// the next within the same test binary process.
#[cfg(any(test, feature = "test-support"))]
pub fn reset_quit_for_test() {
    QUIT.store(false, Ordering::SeqCst);
    INT_SEEN.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The flags under test are process-global statics; serialize access
    // so the two tests below don't race under a parallel test runner.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn request_quit_sets_flag_without_touching_exit_code() {
        let _guard = TEST_LOCK.lock().unwrap();
        request_quit();
        assert!(quit_requested());
        assert!(!exit_code_is_one());
        QUIT.store(false, Ordering::SeqCst);
    }

    #[test]
    fn hup_and_usr1_flags_clear_on_take() {
        let _guard = TEST_LOCK.lock().unwrap();
        HUP.store(true, Ordering::SeqCst);
        assert!(take_hup());
        assert!(!take_hup());

        USR1.store(true, Ordering::SeqCst);
        assert!(take_usr1());
        assert!(!take_usr1());
    }
}
