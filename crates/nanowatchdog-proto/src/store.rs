//! Fixed-layout non-volatile event store.
//!
//! ```text
//! offset 0       one event record  — initialization marker
//! offset 37      i32 LE            — reset event count (0..=10)
//! offset 39..409 ten event records — slot 0 newest .. slot 9 oldest
//! offset 409..   reserved
//! ```

use crate::event::{EventRecord, RECORD_LEN};
use crate::ProtocolError;

pub const NVM_SIZE: usize = 1024;
const INIT_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 37;
const RING_OFFSET: usize = 39;
pub const RING_SLOTS: usize = 10;

/// The board's non-volatile memory region, addressed at fixed byte offsets.
pub struct EventStore {
    raw: [u8; NVM_SIZE],
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    /// A freshly powered-on, never-initialized region. Every slot reads as
    /// null until `init` (the `EEPROM INIT` effect) runs.
    pub fn new() -> Self {
        EventStore {
            raw: [0u8; NVM_SIZE],
        }
    }

    /// `EEPROM INIT`: zero the whole region, then stamp the init marker.
    pub fn init(&mut self, firmware_version: &str, now: i32) {
        self.raw = [0u8; NVM_SIZE];
        let rec = EventRecord::init(firmware_version, now);
        self.write_init(&rec);
        self.write_count(0);
    }

    pub fn write_init(&mut self, rec: &EventRecord) {
        self.raw[INIT_OFFSET..INIT_OFFSET + RECORD_LEN].copy_from_slice(&rec.to_bytes());
    }

    pub fn read_init(&self) -> EventRecord {
        EventRecord::from_bytes(&self.raw[INIT_OFFSET..INIT_OFFSET + RECORD_LEN])
            .unwrap_or_else(|_| EventRecord::null())
    }

    pub fn count(&self) -> i32 {
        i32::from_le_bytes(
            self.raw[COUNT_OFFSET..COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    fn write_count(&mut self, n: i32) {
        self.raw[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&n.to_le_bytes());
    }

    fn slot_offset(i: usize) -> usize {
        RING_OFFSET + i * RECORD_LEN
    }

    /// Read ring slot `i` (0 = newest). An empty slot reads back null.
    pub fn read_slot(&self, i: usize) -> EventRecord {
        let off = Self::slot_offset(i);
        EventRecord::from_bytes(&self.raw[off..off + RECORD_LEN])
            .unwrap_or_else(|_| EventRecord::null())
    }

    fn write_slot(&mut self, i: usize, rec: &EventRecord) {
        let off = Self::slot_offset(i);
        self.raw[off..off + RECORD_LEN].copy_from_slice(&rec.to_bytes());
    }

    /// Shift every slot one toward the oldest end, discarding slot 9, and
    /// insert `rec` at slot 0. The counter saturates at `RING_SLOTS`.
    pub fn push_reset(&mut self, rec: EventRecord) {
        for i in (1..RING_SLOTS).rev() {
            let older = self.read_slot(i - 1);
            self.write_slot(i, &older);
        }
        self.write_slot(0, &rec);
        let n = (self.count() + 1).min(RING_SLOTS as i32);
        self.write_count(n);
    }

    /// `ACKNOWLEDGE i`: set the ack bit on ring slot `i` and write it back.
    pub fn acknowledge(&mut self, i: usize) -> Result<(), ProtocolError> {
        if i >= RING_SLOTS {
            return Err(ProtocolError::ArgumentOutOfRange(format!(
                "ACKNOWLEDGE {i}"
            )));
        }
        let mut rec = self.read_slot(i);
        rec.acknowledged = true;
        self.write_slot(i, &rec);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8; NVM_SIZE] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_zeroes_ring_and_stamps_init_slot() {
        let mut store = EventStore::new();
        store.push_reset(EventRecord::reset("1.0", 10, 22));
        store.init("1.0", 1_700_000_000);
        assert_eq!(store.count(), 0);
        for i in 0..RING_SLOTS {
            assert!(store.read_slot(i).is_null());
        }
        let init_rec = store.read_init();
        assert_eq!(init_rec.reason, crate::command::REASON_INIT);
        assert!(init_rec.acknowledged);
        assert_eq!(init_rec.time, 1_700_000_000);
    }

    #[test]
    fn ring_shifts_and_saturates_at_ten() {
        let mut store = EventStore::new();
        for t in 1..=11 {
            store.push_reset(EventRecord::reset("1.0", t, 22));
        }
        assert_eq!(store.count(), 10);
        // Slot 0 is the most recent insertion (t=11), slot 9 the oldest retained (t=2).
        assert_eq!(store.read_slot(0).time, 11);
        assert_eq!(store.read_slot(9).time, 2);
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let mut store = EventStore::new();
        store.push_reset(EventRecord::reset("1.0", 5, 22));
        store.acknowledge(0).unwrap();
        let first = store.read_slot(0).acknowledged;
        store.acknowledge(0).unwrap();
        assert_eq!(first, store.read_slot(0).acknowledged);
        assert!(store.read_slot(0).acknowledged);
    }

    #[test]
    fn acknowledge_out_of_range_rejected() {
        let mut store = EventStore::new();
        assert!(store.acknowledge(10).is_err());
    }
}
