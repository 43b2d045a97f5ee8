//! Physical placement of the slot metadata record.

use crate::error::{Result, StorageError};
use bootctl_core::{SmdLocation, StorageDevice, SMD_LOCATION_SIZE};
use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Default userspace-visible slot metadata partition.
pub const DEFAULT_SMD_PATH: &str = "/dev/block/by-name/SMD";

/// How the primary and backup copies are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLayout {
    /// Both copies on one raw device without an accessible partition table,
    /// `partition_size` bytes apart.
    OffsetPair {
        device: PathBuf,
        location: SmdLocation,
    },
    /// One copy at the start of each of two named partitions.
    TwinPartition { primary: PathBuf, backup: PathBuf },
}

/// Resolved store location, fixed for the lifetime of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDescriptor {
    pub device_type: StorageDevice,
    pub layout: StoreLayout,
}

impl StoreDescriptor {
    /// Twin-partition layout with the backup at `<primary>_b`.
    pub fn twin(primary: impl Into<PathBuf>) -> Self {
        let primary = primary.into();
        let backup = backup_partition_path(&primary);
        Self {
            device_type: SmdLocation::USER_DEFAULT.device_type,
            layout: StoreLayout::TwinPartition { primary, backup },
        }
    }

    /// Offset-pair layout on a raw device.
    pub fn offset_pair(device: impl Into<PathBuf>, location: SmdLocation) -> Self {
        Self {
            device_type: location.device_type,
            layout: StoreLayout::OffsetPair {
                device: device.into(),
                location,
            },
        }
    }

    /// Path holding the primary copy.
    pub fn primary_path(&self) -> &Path {
        match &self.layout {
            StoreLayout::OffsetPair { device, .. } => device,
            StoreLayout::TwinPartition { primary, .. } => primary,
        }
    }

    /// Path holding the backup copy.
    pub fn backup_path(&self) -> &Path {
        match &self.layout {
            StoreLayout::OffsetPair { device, .. } => device,
            StoreLayout::TwinPartition { backup, .. } => backup,
        }
    }

    /// Byte offset of the primary copy within its path.
    pub fn primary_offset(&self) -> u64 {
        match &self.layout {
            StoreLayout::OffsetPair { location, .. } => location.primary_offset(),
            StoreLayout::TwinPartition { .. } => 0,
        }
    }

    /// Byte offset of the backup copy within its path.
    pub fn backup_offset(&self) -> u64 {
        match &self.layout {
            StoreLayout::OffsetPair { location, .. } => location.backup_offset(),
            StoreLayout::TwinPartition { .. } => 0,
        }
    }
}

/// Backup partitions are named after the primary with a `_b` suffix.
pub fn backup_partition_path(primary: &Path) -> PathBuf {
    let mut name = OsString::from(primary.as_os_str());
    name.push("_b");
    PathBuf::from(name)
}

/// Read the slot metadata location entry from a boot configuration table.
pub fn read_smd_location(device: &Path, offset: u64) -> Result<SmdLocation> {
    let mut file = File::open(device)
        .map_err(|e| StorageError::io(format!("open {}", device.display()), e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError::io(format!("seek {} to {:#x}", device.display(), offset), e))?;

    let mut bytes = [0u8; SMD_LOCATION_SIZE];
    file.read_exact(&mut bytes)
        .map_err(|e| StorageError::io(format!("read BCT entry from {}", device.display()), e))?;

    Ok(SmdLocation::from_bytes(&bytes))
}
