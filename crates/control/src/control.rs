//! Backend selection and the [`BootControl`] facade.

use crate::block::BlockSlotStore;
use crate::config::{BackendChoice, BootControlConfig};
use crate::error::{BootControlError, Result};
use crate::platform::{DeviceTreeDetector, PlatformDetector};
use crate::properties::{Getprop, KernelCmdline, LayeredProperties, PropertySource, StaticProperties};
use crate::register::{RegisterSlotStore, BOOT_CHAIN_FW_CURRENT};
use crate::resolve::resolve_descriptor;
use crate::store::SlotStateStore;
use bootctl_core::Soc;
use bootctl_storage::{BlockStore, EfivarFs, FirmwareVariables, ScratchRegister, NVIDIA_PUBLIC_VARIABLE_GUID};
use tracing::{debug, info};

/// The store backing a [`BootControl`].
pub enum SlotBackend {
    Block(BlockSlotStore),
    Register(RegisterSlotStore),
}

/// A slot state store selected for the running platform.
pub struct BootControl {
    soc: Soc,
    backend: SlotBackend,
}

impl BootControl {
    /// Open the store for the running system.
    ///
    /// The platform comes from the device tree, properties from the config
    /// overrides, `getprop` and the kernel command line, in that order, and
    /// firmware variables from efivarfs.
    pub fn open(config: &BootControlConfig) -> Result<Self> {
        let detector = DeviceTreeDetector::new(&config.compatible_path);
        let variables = EfivarFs::with_root(&config.efivars_path);
        Self::open_with(config, &detector, system_properties(config), variables)
    }

    /// Open with explicit collaborators.
    pub fn open_with<D, P, V>(
        config: &BootControlConfig,
        detector: &D,
        properties: P,
        variables: V,
    ) -> Result<Self>
    where
        D: PlatformDetector + ?Sized,
        P: PropertySource + Send + Sync + 'static,
        V: FirmwareVariables + Send + Sync + 'static,
    {
        let soc = detector.detect_platform();
        let backend = match config.backend {
            BackendChoice::Auto => auto_backend(soc, &variables),
            forced => forced,
        };

        let backend = match backend {
            BackendChoice::Register => {
                let address = config
                    .register_address
                    .or_else(|| soc.scratch_register_address())
                    .ok_or_else(|| BootControlError::Unavailable(format!("scratch register on {}", soc)))?;
                info!(%soc, address, "using scratch register backend");
                let register = ScratchRegister::with_mem_path(&config.dev_mem_path, address);
                SlotBackend::Register(RegisterSlotStore::new(register, variables))
            }
            _ => {
                let descriptor = resolve_descriptor(soc, &properties, &config.smd_path);
                info!(%soc, path = %descriptor.primary_path().display(), "using block device backend");
                let store = BlockStore::with_force_ro(descriptor, &config.force_ro_path);
                SlotBackend::Block(BlockSlotStore::new(store, properties))
            }
        };
        Ok(Self { soc, backend })
    }

    /// Platform detected when the store was opened.
    pub fn soc(&self) -> Soc {
        self.soc
    }

    /// Name of the selected backend.
    pub fn backend(&self) -> BackendChoice {
        match self.backend {
            SlotBackend::Block(_) => BackendChoice::Block,
            SlotBackend::Register(_) => BackendChoice::Register,
        }
    }

    /// The concrete store, for backend-specific inspection.
    pub fn slot_backend(&self) -> &SlotBackend {
        &self.backend
    }

    fn store(&self) -> &dyn SlotStateStore {
        match &self.backend {
            SlotBackend::Block(store) => store,
            SlotBackend::Register(store) => store,
        }
    }
}

/// Layered property source for a live system.
pub fn system_properties(config: &BootControlConfig) -> LayeredProperties {
    let mut layers = LayeredProperties::new().push(StaticProperties::from(config.properties.clone()));
    if config.use_getprop {
        layers = layers.push(Getprop);
    }
    layers.push(KernelCmdline::load(&config.cmdline_path))
}

/// Backend for a platform when none is forced.
///
/// T186 and T194 ship either flavor of firmware; the presence of the
/// running-slot variable tells them apart.
fn auto_backend<V: FirmwareVariables + ?Sized>(soc: Soc, variables: &V) -> BackendChoice {
    if soc.is_uefi_only() {
        return BackendChoice::Register;
    }
    match soc {
        Soc::T186 | Soc::T194 => {
            match variables.get_variable(&NVIDIA_PUBLIC_VARIABLE_GUID, BOOT_CHAIN_FW_CURRENT) {
                Ok(Some(_)) => BackendChoice::Register,
                Ok(None) => BackendChoice::Block,
                Err(e) => {
                    debug!(error = %e, "firmware variables unavailable");
                    BackendChoice::Block
                }
            }
        }
        _ => BackendChoice::Block,
    }
}

impl SlotStateStore for BootControl {
    fn number_slots(&self) -> Result<u32> {
        self.store().number_slots()
    }

    fn current_slot(&self) -> Result<u32> {
        self.store().current_slot()
    }

    fn mark_boot_successful(&self) -> Result<()> {
        self.store().mark_boot_successful()
    }

    fn set_active_boot_slot(&self, slot: u32) -> Result<()> {
        self.store().set_active_boot_slot(slot)
    }

    fn set_slot_as_unbootable(&self, slot: u32) -> Result<()> {
        self.store().set_slot_as_unbootable(slot)
    }

    fn is_slot_bootable(&self, slot: u32) -> Result<bool> {
        self.store().is_slot_bootable(slot)
    }

    fn is_slot_marked_successful(&self, slot: u32) -> Result<bool> {
        self.store().is_slot_marked_successful(slot)
    }

    fn suffix(&self, slot: u32) -> Result<String> {
        self.store().suffix(slot)
    }
}
