//! The 37-byte event record persisted in the board's non-volatile memory.
//!
//! Layout (little-endian, matching the reference microcontroller target):
//! `version[32]` null-padded ASCII, `time[4]` signed seconds-since-epoch,
//! `packed[1]` bit 7 = acknowledged, bits 6..0 = reason code.

use crate::ProtocolError;

pub const RECORD_LEN: usize = 37;
const VERSION_LEN: usize = 32;

/// One persisted reset (or initialization) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub version: String,
    /// Seconds since 1970-01-01 UTC. Zero means "null" (empty slot).
    pub time: i32,
    pub reason: u8,
    pub acknowledged: bool,
}

impl EventRecord {
    /// A null record: the shape an empty ring slot reads back as.
    pub fn null() -> Self {
        EventRecord {
            version: String::new(),
            time: 0,
            reason: 0,
            acknowledged: false,
        }
    }

    pub fn init(version: &str, time: i32) -> Self {
        EventRecord {
            version: version.to_string(),
            time,
            reason: crate::command::REASON_INIT,
            acknowledged: true,
        }
    }

    pub fn reset(version: &str, time: i32, reason: u8) -> Self {
        EventRecord {
            version: version.to_string(),
            time,
            reason,
            acknowledged: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.time == 0
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        let v = self.version.as_bytes();
        let n = v.len().min(VERSION_LEN);
        buf[..n].copy_from_slice(&v[..n]);
        buf[VERSION_LEN..VERSION_LEN + 4].copy_from_slice(&self.time.to_le_bytes());
        let ack_bit = if self.acknowledged { 0x80 } else { 0x00 };
        buf[VERSION_LEN + 4] = ack_bit | (self.reason & 0x7f);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != RECORD_LEN {
            return Err(ProtocolError::Malformed(format!(
                "event record must be {RECORD_LEN} bytes, got {}",
                buf.len()
            )));
        }
        let version_bytes = &buf[..VERSION_LEN];
        let nul = version_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VERSION_LEN);
        let version = String::from_utf8_lossy(&version_bytes[..nul]).into_owned();
        let time = i32::from_le_bytes(buf[VERSION_LEN..VERSION_LEN + 4].try_into().unwrap());
        let packed = buf[VERSION_LEN + 4];
        let acknowledged = packed & 0x80 != 0;
        let reason = packed & 0x7f;
        Ok(EventRecord {
            version,
            time,
            reason,
            acknowledged,
        })
    }
}
