//! Resolution of where the slot metadata record lives.

use crate::properties::{PropertySource, BOOT_DEVICE_PROPERTY};
use bootctl_core::Soc;
use bootctl_storage::{read_smd_location, StoreDescriptor};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Pick the store descriptor for a platform.
///
/// Generations with a readable boot configuration table look up the record
/// location in it. User-data-class devices, unreadable tables and every
/// other generation use the twin-partition layout on `smd_path`.
pub fn resolve_descriptor<P>(soc: Soc, properties: &P, smd_path: &Path) -> StoreDescriptor
where
    P: PropertySource + ?Sized,
{
    let Some(offset) = soc.bct_smd_offset() else {
        debug!(%soc, "no boot configuration table, using twin partitions");
        return StoreDescriptor::twin(smd_path);
    };

    let default_device = smd_path.to_string_lossy();
    let boot_device = PathBuf::from(properties.get_property(BOOT_DEVICE_PROPERTY, &default_device));
    if boot_device == smd_path {
        return StoreDescriptor::twin(smd_path);
    }

    match read_smd_location(&boot_device, offset) {
        Ok(location) if location.device_type.is_user_class() => {
            debug!(device = %location.device_type, "user-class media, using twin partitions");
            StoreDescriptor::twin(smd_path)
        }
        Ok(location) => {
            debug!(
                device = %boot_device.display(),
                start_sector = location.start_sector,
                partition_size = location.partition_size,
                "resolved offset-pair layout"
            );
            StoreDescriptor::offset_pair(boot_device, location)
        }
        Err(e) => {
            warn!(device = %boot_device.display(), error = %e, "boot configuration table unreadable, using twin partitions");
            StoreDescriptor::twin(smd_path)
        }
    }
}
