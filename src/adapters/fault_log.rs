//! RAM-backed fault log.
//!
//! Keeps the last `N` [`FaultEntry`] records postcard-encoded in a ring
//! of fixed slots.  On the board this region sits in RTC slow memory,
//! which survives the brown-out that follows a fuse destruction; on host
//! it is plain memory for tests.  When the ring is full the oldest entry
//! is overwritten.

use heapless::{Deque, Vec};

use crate::app::ports::{FaultRecorder, StorageError};
use crate::safety::FaultEntry;

type Slot = Vec<u8, { FaultEntry::MAX_ENCODED_LEN }>;

pub struct RamFaultLog<const N: usize> {
    slots: Deque<Slot, N>,
}

impl<const N: usize> RamFaultLog<N> {
    pub const fn new() -> Self {
        Self {
            slots: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Most recent entry, if any decodes.
    pub fn latest(&self) -> Option<FaultEntry> {
        self.slots
            .back()
            .and_then(|bytes| FaultEntry::decode(bytes).ok())
    }

    /// All decodable entries, oldest first.
    pub fn read_all(&self) -> Vec<FaultEntry, N> {
        let mut out = Vec::new();
        for bytes in &self.slots {
            if let Ok(entry) = FaultEntry::decode(bytes) {
                // Capacity equals the slot count.
                let _ = out.push(entry);
            }
        }
        out
    }
}

impl<const N: usize> Default for RamFaultLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FaultRecorder for RamFaultLog<N> {
    fn record(&mut self, entry: &FaultEntry) -> Result<(), StorageError> {
        let mut buf = [0u8; FaultEntry::MAX_ENCODED_LEN];
        let used = entry.encode(&mut buf).map_err(|_| StorageError::Encode)?;
        let slot = Slot::from_slice(used).map_err(|()| StorageError::Encode)?;

        if self.slots.is_full() {
            self.slots.pop_front();
        }
        self.slots
            .push_back(slot)
            .map_err(|_| StorageError::Full)
    }
}
