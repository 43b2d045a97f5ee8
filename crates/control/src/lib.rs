//! A/B boot slot control.
//!
//! One contract, [`SlotStateStore`], over two storage substrates:
//! - [`BlockSlotStore`]: the redundant slot metadata record on raw media
//! - [`RegisterSlotStore`]: the boot scratch register plus firmware variables
//!
//! [`BootControl`] picks one of them once, at construction, from the detected
//! SoC and the [`BootControlConfig`]. Every host path is injectable through
//! the config, so the whole stack runs against plain files in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use bootctl_control::{BootControl, BootControlConfig, SlotStateStore};
//!
//! let control = BootControl::open(&BootControlConfig::default()).unwrap();
//! let current = control.current_slot().unwrap();
//! control.mark_boot_successful().unwrap();
//! println!("running from slot {}", control.suffix(current).unwrap());
//! ```

pub mod block;
pub mod config;
pub mod control;
pub mod error;
pub mod platform;
pub mod properties;
pub mod register;
pub mod resolve;
pub mod store;

pub use block::BlockSlotStore;
pub use config::{BackendChoice, BootControlConfig};
pub use control::{system_properties, BootControl, SlotBackend};
pub use error::{BootControlError, ErrorKind, Result};
pub use platform::{DeviceTreeDetector, FixedPlatform, PlatformDetector};
pub use properties::{
    Getprop, KernelCmdline, LayeredProperties, PropertySource, StaticProperties,
    BOOT_DEVICE_PROPERTY, SLOT_SUFFIX_PROPERTY,
};
pub use register::RegisterSlotStore;
pub use resolve::resolve_descriptor;
pub use store::SlotStateStore;
