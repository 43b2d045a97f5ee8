//! Slot metadata location as described by the boot configuration table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sector size used to turn `start_sector` into a byte offset.
pub const SECTOR_SIZE: u64 = 512;

/// Encoded size of an [`SmdLocation`] entry.
pub const SMD_LOCATION_SIZE: usize = 12;

/// Storage device classes known to the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageDevice {
    SdmmcBoot,
    SdmmcUser,
    SdmmcRpmb,
    QspiFlash,
    Sata,
    UsbMassStorage,
    SdCard,
    Ufs,
    UfsUser,
    UfsRpmb,
    Nvme,
    Unknown(u16),
}

impl StorageDevice {
    /// Decode the bootloader's numeric device type.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::SdmmcBoot,
            1 => Self::SdmmcUser,
            2 => Self::SdmmcRpmb,
            3 => Self::QspiFlash,
            4 => Self::Sata,
            5 => Self::UsbMassStorage,
            6 => Self::SdCard,
            7 => Self::Ufs,
            8 => Self::UfsUser,
            9 => Self::UfsRpmb,
            10 => Self::Nvme,
            other => Self::Unknown(other),
        }
    }

    /// The bootloader's numeric device type.
    pub fn to_raw(self) -> u16 {
        match self {
            Self::SdmmcBoot => 0,
            Self::SdmmcUser => 1,
            Self::SdmmcRpmb => 2,
            Self::QspiFlash => 3,
            Self::Sata => 4,
            Self::UsbMassStorage => 5,
            Self::SdCard => 6,
            Self::Ufs => 7,
            Self::UfsUser => 8,
            Self::UfsRpmb => 9,
            Self::Nvme => 10,
            Self::Unknown(other) => other,
        }
    }

    /// User-data class devices carry a partition table, so the record lives
    /// in named partitions rather than at a raw offset.
    pub fn is_user_class(self) -> bool {
        matches!(
            self,
            Self::SdmmcUser
                | Self::Sata
                | Self::UsbMassStorage
                | Self::SdCard
                | Self::UfsUser
                | Self::Nvme
        )
    }

    /// eMMC boot partitions are write protected by default.
    pub fn is_write_protected(self) -> bool {
        self == Self::SdmmcBoot
    }
}

impl fmt::Display for StorageDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SdmmcBoot => write!(f, "sdmmc-boot"),
            Self::SdmmcUser => write!(f, "sdmmc-user"),
            Self::SdmmcRpmb => write!(f, "sdmmc-rpmb"),
            Self::QspiFlash => write!(f, "qspi-flash"),
            Self::Sata => write!(f, "sata"),
            Self::UsbMassStorage => write!(f, "usb-ms"),
            Self::SdCard => write!(f, "sdcard"),
            Self::Ufs => write!(f, "ufs"),
            Self::UfsUser => write!(f, "ufs-user"),
            Self::UfsRpmb => write!(f, "ufs-rpmb"),
            Self::Nvme => write!(f, "nvme"),
            Self::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}

/// Where the slot metadata lives on a storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmdLocation {
    pub device_type: StorageDevice,
    pub device_instance: u16,
    pub start_sector: u32,
    /// Distance in bytes between the primary and backup copies.
    pub partition_size: u32,
}

impl SmdLocation {
    /// Location used when the record sits in userspace-visible partitions.
    pub const USER_DEFAULT: Self = Self {
        device_type: StorageDevice::SdmmcUser,
        device_instance: 3,
        start_sector: 0,
        partition_size: 4096,
    };

    /// Byte offset of the primary copy.
    pub fn primary_offset(&self) -> u64 {
        u64::from(self.start_sector) * SECTOR_SIZE
    }

    /// Byte offset of the backup copy.
    pub fn backup_offset(&self) -> u64 {
        self.primary_offset() + u64::from(self.partition_size)
    }

    /// Decode a little-endian table entry.
    pub fn from_bytes(bytes: &[u8; SMD_LOCATION_SIZE]) -> Self {
        Self {
            device_type: StorageDevice::from_raw(u16::from_le_bytes([bytes[0], bytes[1]])),
            device_instance: u16::from_le_bytes([bytes[2], bytes[3]]),
            start_sector: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            partition_size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// Encode as a little-endian table entry.
    pub fn to_bytes(&self) -> [u8; SMD_LOCATION_SIZE] {
        let mut bytes = [0u8; SMD_LOCATION_SIZE];
        bytes[0..2].copy_from_slice(&self.device_type.to_raw().to_le_bytes());
        bytes[2..4].copy_from_slice(&self.device_instance.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.start_sector.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.partition_size.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_raw_values() {
        for raw in 0..=12u16 {
            assert_eq!(StorageDevice::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(StorageDevice::from_raw(1), StorageDevice::SdmmcUser);
        assert_eq!(StorageDevice::from_raw(10), StorageDevice::Nvme);
        assert_eq!(StorageDevice::from_raw(11), StorageDevice::Unknown(11));
    }

    #[test]
    fn test_user_class() {
        assert!(StorageDevice::SdmmcUser.is_user_class());
        assert!(StorageDevice::Nvme.is_user_class());
        assert!(StorageDevice::UfsUser.is_user_class());
        assert!(!StorageDevice::SdmmcBoot.is_user_class());
        assert!(!StorageDevice::QspiFlash.is_user_class());
        assert!(!StorageDevice::Unknown(42).is_user_class());
    }

    #[test]
    fn test_offsets() {
        let location = SmdLocation {
            device_type: StorageDevice::QspiFlash,
            device_instance: 0,
            start_sector: 8,
            partition_size: 0x1000,
        };
        assert_eq!(location.primary_offset(), 4096);
        assert_eq!(location.backup_offset(), 8192);
    }

    #[test]
    fn test_table_entry_layout() {
        let bytes = [0, 0, 3, 0, 0x10, 0, 0, 0, 0, 0x10, 0, 0];
        let location = SmdLocation::from_bytes(&bytes);
        assert_eq!(location.device_type, StorageDevice::SdmmcBoot);
        assert_eq!(location.device_instance, 3);
        assert_eq!(location.start_sector, 16);
        assert_eq!(location.partition_size, 4096);
        assert_eq!(location.to_bytes(), bytes);
    }
}
