//! Core slot-state primitives for bootctl.
//!
//! This crate provides the data model shared by every boot control backend:
//! - Slot metadata records and their per-slot entries
//! - The packed record codec with CRC-32 integrity
//! - The boot scratch register bit layout
//! - Boot configuration table location entries
//! - SoC generation detection
//!
//! Nothing here touches the filesystem; see `bootctl-storage` for that.

pub mod codec;
pub mod location;
pub mod record;
pub mod register;
pub mod soc;

// Re-export commonly used types at the crate root
pub use codec::{decode, decode_unverified, encode, CodecError, RECORD_SIZE};
pub use location::{SmdLocation, StorageDevice, SECTOR_SIZE, SMD_LOCATION_SIZE};
pub use record::{
    SlotInfo, SlotRecord, Suffix, DEMOTED_PRIORITY, MAX_PRIORITY, MAX_RETRY_COUNT, MAX_SLOTS,
    SMD_MAGIC, SMD_VERSION, SUFFIX_A, SUFFIX_B,
};
pub use register::{RegisterState, SlotBits, REGISTER_SENTINEL, UNAVAILABLE};
pub use soc::Soc;
