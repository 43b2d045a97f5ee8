//! Physical substrates for A/B slot state.
//!
//! This crate provides the storage backends that hold boot slot state:
//! - Slot metadata records on raw block devices (primary + backup copy)
//! - The memory-mapped boot scratch register
//! - Platform firmware (UEFI) variables
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    bootctl-control                       │
//! │        (SlotStateStore, backend selection, CLI)          │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────┐  │
//! │  │ BlockStore  │  │ ScratchRegister │  │ Firmware    │  │
//! │  │  - primary  │  │  - /dev/mem     │  │ Variables   │  │
//! │  │  - backup   │  │  - volatile u32 │  │  - efivarfs │  │
//! │  │  - verify   │  │                 │  │  - memory   │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bootctl_storage::{BlockStore, StoreDescriptor};
//!
//! let store = BlockStore::new(StoreDescriptor::twin("/dev/block/by-name/SMD"));
//! let mut record = store.read_record().unwrap();
//! record.slots[1].mark_unbootable();
//! store.write_record(&mut record).unwrap();
//! ```

pub mod block;
pub mod descriptor;
pub mod efivars;
pub mod error;
pub mod register;

// Re-export commonly used types
pub use block::{BlockStore, CopyStatus, ValidationReport, WriteProtectGuard, DEFAULT_FORCE_RO_PATH};
pub use descriptor::{read_smd_location, StoreDescriptor, StoreLayout, DEFAULT_SMD_PATH};
pub use efivars::{
    EfivarFs, FirmwareVariables, InMemoryVariables, Variable, DEFAULT_ATTRIBUTES,
    DEFAULT_EFIVARS_PATH, NVIDIA_PUBLIC_VARIABLE_GUID,
};
pub use error::{Result, StorageError};
pub use register::{ScratchRegister, DEFAULT_DEV_MEM_PATH};
pub use uguid::Guid;
