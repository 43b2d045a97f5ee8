//! Slot metadata record (SMD) data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic number identifying a slot metadata record (`"\0NBC"` little-endian).
pub const SMD_MAGIC: u32 = 0x4342_4E00;

/// Record format version written by this crate.
pub const SMD_VERSION: u16 = 3;

/// Number of slot entries physically present in a record.
pub const MAX_SLOTS: usize = 2;

/// Highest boot priority.
pub const MAX_PRIORITY: u8 = 15;

/// Priority given to the running slot when another slot is activated.
pub const DEMOTED_PRIORITY: u8 = 14;

/// Full retry budget for a freshly activated or successfully booted slot.
pub const MAX_RETRY_COUNT: u8 = 7;

/// Suffix of slot A.
pub const SUFFIX_A: &str = "_a";

/// Suffix of slot B.
pub const SUFFIX_B: &str = "_b";

/// Two-byte partition suffix naming a slot (e.g. `_a`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Suffix(pub [u8; 2]);

impl Suffix {
    /// Suffix of slot A.
    pub const A: Self = Self(*b"_a");
    /// Suffix of slot B.
    pub const B: Self = Self(*b"_b");

    /// Get the raw suffix bytes.
    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// Compare against the first two bytes of a running slot suffix string.
    ///
    /// Strings shorter than two bytes never match.
    pub fn matches(&self, running: &str) -> bool {
        running.as_bytes().get(..2) == Some(&self.0[..])
    }
}

impl fmt::Debug for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Suffix({:?})", self.to_string())
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&String::from_utf8_lossy(&self.0))
    }
}

impl From<[u8; 2]> for Suffix {
    fn from(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }
}

/// Per-slot boot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Boot priority, 0 (unbootable) to 15 (highest).
    pub priority: u8,
    /// Partition suffix of the slot.
    pub suffix: Suffix,
    /// Remaining boot attempts, 0 to 7.
    pub retry_count: u8,
    /// Whether the slot has booted successfully.
    pub boot_successful: bool,
}

impl SlotInfo {
    /// A slot is bootable while its priority is non-zero.
    pub fn is_bootable(&self) -> bool {
        self.priority != 0
    }

    /// Record a successful boot and refill the retry budget.
    pub fn mark_successful(&mut self) {
        self.boot_successful = true;
        self.retry_count = MAX_RETRY_COUNT;
    }

    /// Make this the preferred slot for the next boot.
    pub fn activate(&mut self) {
        self.priority = MAX_PRIORITY;
        self.boot_successful = false;
        self.retry_count = MAX_RETRY_COUNT;
    }

    /// Clear all state so the bootloader never falls back to this slot.
    pub fn mark_unbootable(&mut self) {
        self.priority = 0;
        self.boot_successful = false;
        self.retry_count = 0;
    }
}

/// The whole slot metadata record as persisted on media.
///
/// `checksum` carries whatever was read from media; it is recomputed by
/// [`crate::codec::encode`] and only trusted after [`crate::codec::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub magic: u32,
    pub version: u16,
    pub num_slots: u16,
    pub slots: [SlotInfo; MAX_SLOTS],
    pub checksum: u32,
}

impl SlotRecord {
    /// The record written at manufacturing time.
    ///
    /// Slot A is the preferred slot; slot B is a bootable fallback.
    pub fn factory() -> Self {
        let mut record = Self {
            magic: SMD_MAGIC,
            version: SMD_VERSION,
            num_slots: MAX_SLOTS as u16,
            slots: [
                SlotInfo {
                    priority: MAX_PRIORITY,
                    suffix: Suffix::A,
                    retry_count: MAX_RETRY_COUNT,
                    boot_successful: true,
                },
                SlotInfo {
                    priority: 10,
                    suffix: Suffix::B,
                    retry_count: MAX_RETRY_COUNT,
                    boot_successful: true,
                },
            ],
            checksum: 0,
        };
        record.checksum = crate::codec::checksum(&record);
        record
    }

    /// Check the magic number.
    pub fn has_valid_magic(&self) -> bool {
        self.magic == SMD_MAGIC
    }

    /// Number of addressable slots.
    ///
    /// A stored count larger than the physical slot array is clamped.
    pub fn slot_count(&self) -> usize {
        usize::from(self.num_slots).min(MAX_SLOTS)
    }

    /// Get a slot by index, `None` when out of range.
    pub fn slot(&self, index: usize) -> Option<&SlotInfo> {
        self.slots[..self.slot_count()].get(index)
    }

    /// Get a mutable slot by index, `None` when out of range.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut SlotInfo> {
        let count = self.slot_count();
        self.slots[..count].get_mut(index)
    }

    /// Find the slot whose suffix matches the running slot suffix.
    pub fn find_suffix(&self, running: &str) -> Option<usize> {
        self.slots[..self.slot_count()]
            .iter()
            .position(|slot| slot.suffix.matches(running))
    }
}
