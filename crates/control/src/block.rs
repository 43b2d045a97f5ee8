//! Slot state kept in the block-device slot metadata record.

use crate::error::{BootControlError, Result};
use crate::properties::{PropertySource, SLOT_SUFFIX_PROPERTY};
use crate::store::SlotStateStore;
use bootctl_core::{SlotRecord, DEMOTED_PRIORITY};
use bootctl_storage::{BlockStore, ValidationReport};
use tracing::info;

/// [`SlotStateStore`] over a [`BlockStore`].
///
/// The running slot is the one whose stored suffix matches the
/// `ro.boot.slot_suffix` property.
pub struct BlockSlotStore {
    store: BlockStore,
    properties: Box<dyn PropertySource + Send + Sync>,
}

impl BlockSlotStore {
    pub fn new(store: BlockStore, properties: impl PropertySource + Send + Sync + 'static) -> Self {
        Self {
            store,
            properties: Box::new(properties),
        }
    }

    /// The underlying record store.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Read the current record from the primary copy, unverified.
    pub fn record(&self) -> Result<SlotRecord> {
        Ok(self.store.read_record()?)
    }

    /// Check both on-media copies.
    pub fn validate(&self) -> Result<ValidationReport> {
        Ok(self.store.validate()?)
    }

    fn running_suffix(&self) -> String {
        self.properties.get_property(SLOT_SUFFIX_PROPERTY, "")
    }

    fn current_index(&self, record: &SlotRecord) -> Result<usize> {
        let running = self.running_suffix();
        record
            .find_suffix(&running)
            .ok_or(BootControlError::UnknownSuffix(running))
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut SlotRecord) -> Result<()>,
    {
        let mut record = self.store.read_record()?;
        mutate(&mut record)?;
        self.store.write_record(&mut record)?;
        Ok(())
    }
}

fn slot_index(record: &SlotRecord, slot: u32) -> Result<usize> {
    let num_slots = record.slot_count() as u32;
    if slot >= num_slots {
        return Err(BootControlError::OutOfRange { slot, num_slots });
    }
    Ok(slot as usize)
}

impl SlotStateStore for BlockSlotStore {
    fn number_slots(&self) -> Result<u32> {
        Ok(self.record()?.slot_count() as u32)
    }

    fn current_slot(&self) -> Result<u32> {
        let record = self.record()?;
        Ok(self.current_index(&record)? as u32)
    }

    fn mark_boot_successful(&self) -> Result<()> {
        self.update(|record| {
            let current = self.current_index(record)?;
            record.slots[current].mark_successful();
            info!(slot = current, "marked boot successful");
            Ok(())
        })
    }

    fn set_active_boot_slot(&self, slot: u32) -> Result<()> {
        self.update(|record| {
            let target = slot_index(record, slot)?;
            let current = self.current_index(record)?;

            record.slots[target].activate();
            // Reactivating the running slot keeps it at top priority rather
            // than demoting it right after activation.
            if current != target {
                record.slots[current].priority = DEMOTED_PRIORITY;
            }
            info!(slot = target, previous = current, "set active boot slot");
            Ok(())
        })
    }

    fn set_slot_as_unbootable(&self, slot: u32) -> Result<()> {
        self.update(|record| {
            let index = slot_index(record, slot)?;
            record.slots[index].mark_unbootable();
            info!(slot = index, "marked slot unbootable");
            Ok(())
        })
    }

    fn is_slot_bootable(&self, slot: u32) -> Result<bool> {
        let record = self.record()?;
        let index = slot_index(&record, slot)?;
        Ok(record.slots[index].is_bootable())
    }

    fn is_slot_marked_successful(&self, slot: u32) -> Result<bool> {
        let record = self.record()?;
        let index = slot_index(&record, slot)?;
        Ok(record.slots[index].boot_successful)
    }

    fn suffix(&self, slot: u32) -> Result<String> {
        let record = self.record()?;
        let index = slot_index(&record, slot)?;
        Ok(record.slots[index].suffix.to_string())
    }
}
