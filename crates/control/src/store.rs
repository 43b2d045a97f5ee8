//! The slot state contract shared by every backend.

use crate::error::Result;

/// Persistent A/B slot state.
///
/// Slots are indexed from 0. Every slot-indexed operation fails with
/// [`crate::BootControlError::OutOfRange`] when `slot >= number_slots()`.
/// Implementations perform no locking; callers serialize access to one
/// store instance.
pub trait SlotStateStore {
    /// Number of slots the store tracks.
    fn number_slots(&self) -> Result<u32>;

    /// Index of the slot the system is currently running from.
    fn current_slot(&self) -> Result<u32>;

    /// Record that the running slot booted successfully.
    fn mark_boot_successful(&self) -> Result<()>;

    /// Make `slot` the preferred slot for the next boot.
    fn set_active_boot_slot(&self, slot: u32) -> Result<()>;

    /// Mark `slot` as not bootable.
    fn set_slot_as_unbootable(&self, slot: u32) -> Result<()>;

    fn is_slot_bootable(&self, slot: u32) -> Result<bool>;

    fn is_slot_marked_successful(&self, slot: u32) -> Result<bool>;

    /// Partition suffix of `slot`, e.g. `"_a"`.
    fn suffix(&self, slot: u32) -> Result<String>;
}

impl<T: SlotStateStore + ?Sized> SlotStateStore for &T {
    fn number_slots(&self) -> Result<u32> {
        (**self).number_slots()
    }

    fn current_slot(&self) -> Result<u32> {
        (**self).current_slot()
    }

    fn mark_boot_successful(&self) -> Result<()> {
        (**self).mark_boot_successful()
    }

    fn set_active_boot_slot(&self, slot: u32) -> Result<()> {
        (**self).set_active_boot_slot(slot)
    }

    fn set_slot_as_unbootable(&self, slot: u32) -> Result<()> {
        (**self).set_slot_as_unbootable(slot)
    }

    fn is_slot_bootable(&self, slot: u32) -> Result<bool> {
        (**self).is_slot_bootable(slot)
    }

    fn is_slot_marked_successful(&self, slot: u32) -> Result<bool> {
        (**self).is_slot_marked_successful(slot)
    }

    fn suffix(&self, slot: u32) -> Result<String> {
        (**self).suffix(slot)
    }
}
