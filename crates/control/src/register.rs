//! Slot state kept in the boot scratch register and firmware variables.
//!
//! The register holds a two-bit retry field per slot; the firmware variables
//! hold the running slot, the requested next slot, the provisioned retry
//! budget and one boot status word per slot.

use crate::error::{BootControlError, Result};
use crate::store::SlotStateStore;
use bootctl_core::{RegisterState, SlotBits, MAX_SLOTS, SUFFIX_A, SUFFIX_B, UNAVAILABLE};
use bootctl_storage::{FirmwareVariables, ScratchRegister, NVIDIA_PUBLIC_VARIABLE_GUID};
use tracing::{debug, info};

/// Slot the firmware booted.
pub const BOOT_CHAIN_FW_CURRENT: &str = "BootChainFwCurrent";
/// Slot requested for the next boot.
pub const BOOT_CHAIN_FW_NEXT: &str = "BootChainFwNext";
/// Provisioned retry budget.
pub const ROOTFS_RETRY_COUNT_MAX: &str = "RootfsRetryCountMax";
pub const ROOTFS_STATUS_SLOT_A: &str = "RootfsStatusSlotA";
pub const ROOTFS_STATUS_SLOT_B: &str = "RootfsStatusSlotB";

/// Status word of a slot that booted successfully.
pub const ROOTFS_STATUS_SUCCESS: u32 = 0;
/// Status word of a slot marked failed.
pub const ROOTFS_STATUS_FAILED: u32 = 0xFF;

const NUM_SLOTS: u32 = MAX_SLOTS as u32;

/// Name of a slot's status variable.
pub fn status_variable(slot: u32) -> Option<&'static str> {
    match slot {
        0 => Some(ROOTFS_STATUS_SLOT_A),
        1 => Some(ROOTFS_STATUS_SLOT_B),
        _ => None,
    }
}

/// [`SlotStateStore`] over a [`ScratchRegister`] and firmware variables.
pub struct RegisterSlotStore {
    register: ScratchRegister,
    variables: Box<dyn FirmwareVariables + Send + Sync>,
}

impl RegisterSlotStore {
    pub fn new(
        register: ScratchRegister,
        variables: impl FirmwareVariables + Send + Sync + 'static,
    ) -> Self {
        Self {
            register,
            variables: Box::new(variables),
        }
    }

    /// Physical address of the scratch register.
    pub fn register_address(&self) -> u64 {
        self.register.address()
    }

    /// Read the slot bits, reinitializing the register if it does not carry
    /// the sentinel.
    ///
    /// Reinitialization seeds both slots from the provisioned retry budget
    /// and writes the register back before returning.
    pub fn read_state(&self) -> Result<SlotBits> {
        let state = RegisterState(self.read_register()?);
        if state.is_initialized() {
            return Ok(state.bits());
        }

        let retry_max = self.retry_budget()?;
        let bits = SlotBits::initial(retry_max);
        self.write_register(RegisterState::new(bits))?;
        info!(
            previous = state.0,
            bits = bits.0,
            retry_max,
            "reinitialized boot scratch register"
        );
        Ok(bits)
    }

    /// Slot bits, or `0xFFFF` when the register or the retry budget cannot
    /// be obtained.
    ///
    /// An initialized register whose slot bits are all set reads as the same
    /// value; use [`read_state`](Self::read_state) to tell the two apart.
    pub fn state_or_unavailable(&self) -> u16 {
        match self.read_state() {
            Ok(bits) => bits.0,
            Err(e) => {
                debug!(error = %e, "register state unavailable");
                UNAVAILABLE
            }
        }
    }

    /// Raw status word of a slot, `None` if the variable is absent.
    pub fn slot_status(&self, slot: u32) -> Result<Option<u32>> {
        self.variable(self.status_name(slot)?)
    }

    /// Slot requested for the next boot, if any.
    pub fn next_slot(&self) -> Result<Option<u32>> {
        self.variable(BOOT_CHAIN_FW_NEXT)
    }

    /// Any `u32` boot chain variable, `None` if absent.
    pub fn variable(&self, name: &str) -> Result<Option<u32>> {
        Ok(self.variables.get_u32(&NVIDIA_PUBLIC_VARIABLE_GUID, name)?)
    }

    fn read_register(&self) -> Result<u32> {
        self.register
            .read()
            .map_err(|source| BootControlError::RegisterUnavailable {
                address: self.register.address(),
                source,
            })
    }

    fn write_register(&self, state: RegisterState) -> Result<()> {
        self.register
            .write(state.0)
            .map_err(|source| BootControlError::RegisterUnavailable {
                address: self.register.address(),
                source,
            })
    }

    fn retry_budget(&self) -> Result<u32> {
        self.variables
            .get_u32(&NVIDIA_PUBLIC_VARIABLE_GUID, ROOTFS_RETRY_COUNT_MAX)?
            .ok_or(BootControlError::VariableNotFound(ROOTFS_RETRY_COUNT_MAX))
    }

    fn status_name(&self, slot: u32) -> Result<&'static str> {
        status_variable(slot).ok_or(BootControlError::OutOfRange {
            slot,
            num_slots: NUM_SLOTS,
        })
    }

    fn set_status(&self, slot: u32, status: u32) -> Result<()> {
        let name = self.status_name(slot)?;
        self.variables
            .set_u32(&NVIDIA_PUBLIC_VARIABLE_GUID, name, status)?;
        Ok(())
    }

    /// Refill a slot's retry field from the budget and record success.
    fn set_boot_successful(&self, slot: u32) -> Result<()> {
        let bits = self.read_state()?;
        let retry_max = self.retry_budget()?;
        let updated = bits.with_retry(slot, retry_max);
        self.write_register(RegisterState::new(updated))?;
        self.set_status(slot, ROOTFS_STATUS_SUCCESS)?;
        info!(slot, bits = updated.0, "marked boot successful");
        Ok(())
    }
}

fn check_slot(slot: u32) -> Result<()> {
    if slot >= NUM_SLOTS {
        return Err(BootControlError::OutOfRange {
            slot,
            num_slots: NUM_SLOTS,
        });
    }
    Ok(())
}

impl SlotStateStore for RegisterSlotStore {
    fn number_slots(&self) -> Result<u32> {
        Ok(NUM_SLOTS)
    }

    fn current_slot(&self) -> Result<u32> {
        self.variables
            .get_u32(&NVIDIA_PUBLIC_VARIABLE_GUID, BOOT_CHAIN_FW_CURRENT)?
            .ok_or(BootControlError::VariableNotFound(BOOT_CHAIN_FW_CURRENT))
    }

    fn mark_boot_successful(&self) -> Result<()> {
        let current = self.current_slot()?;
        check_slot(current)?;
        self.set_boot_successful(current)
    }

    fn set_active_boot_slot(&self, slot: u32) -> Result<()> {
        check_slot(slot)?;
        self.variables
            .set_u32(&NVIDIA_PUBLIC_VARIABLE_GUID, BOOT_CHAIN_FW_NEXT, slot)?;
        info!(slot, "requested boot slot for next boot");
        self.set_boot_successful(slot)
    }

    /// Only the status variable changes; the register's retry field is left
    /// as it was.
    fn set_slot_as_unbootable(&self, slot: u32) -> Result<()> {
        check_slot(slot)?;
        self.set_status(slot, ROOTFS_STATUS_FAILED)?;
        info!(slot, "marked slot unbootable");
        Ok(())
    }

    fn is_slot_bootable(&self, slot: u32) -> Result<bool> {
        check_slot(slot)?;
        Ok(self.read_state()?.is_bootable(slot))
    }

    fn is_slot_marked_successful(&self, slot: u32) -> Result<bool> {
        check_slot(slot)?;
        Ok(self.slot_status(slot)? == Some(ROOTFS_STATUS_SUCCESS))
    }

    fn suffix(&self, slot: u32) -> Result<String> {
        check_slot(slot)?;
        let suffix = if slot == 0 { SUFFIX_A } else { SUFFIX_B };
        Ok(suffix.to_string())
    }
}
