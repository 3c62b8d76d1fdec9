//! The board's notion of "now": seconds since 1970-01-01 UTC, settable via
//! `SET DATE` and swappable in tests.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send {
    fn now(&self) -> i32;
    /// `SET DATE <epoch>`: adopt a host-supplied wall clock.
    fn set(&mut self, epoch: i32);
}

/// Wraps the OS clock, offset by whatever `SET DATE` last applied.
pub struct SystemClock {
    offset: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { offset: 0 }
    }

    fn raw_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i32 {
        (self.raw_now() + self.offset) as i32
    }

    fn set(&mut self, epoch: i32) {
        self.offset = epoch as i64 - self.raw_now();
    }
}

/// A clock under direct test control: advances only when told to.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeClock {
    now: i32,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn new(start: i32) -> Self {
        FakeClock { now: start }
    }

    pub fn advance(&mut self, secs: i32) {
        self.now += secs;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now(&self) -> i32 {
        self.now
    }

    fn set(&mut self, epoch: i32) {
        self.now = epoch;
    }
}
