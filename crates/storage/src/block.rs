//! Redundant slot metadata record on a block device.
//!
//! Reads trust the primary copy as-is. Writes go to the primary and then the
//! backup, and are only reported successful after both copies are read back,
//! verified against their own checksums and found to agree. A disagreement
//! fails the write; no copy is ever repaired from the other.

use crate::descriptor::{StoreDescriptor, StoreLayout};
use crate::error::{Result, StorageError};
use bootctl_core::{codec, SlotRecord, StorageDevice, RECORD_SIZE};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// sysfs switch guarding the first eMMC boot partition.
pub const DEFAULT_FORCE_RO_PATH: &str = "/sys/block/mmcblk0boot0/force_ro";

/// Checksum state of one on-media copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStatus {
    /// Checksum stored in the copy.
    pub stored: u32,
    /// Checksum computed over the copy's contents.
    pub computed: u32,
}

impl CopyStatus {
    fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let stored = u32::from_le_bytes([
            bytes[codec::CHECKSUM_OFFSET],
            bytes[codec::CHECKSUM_OFFSET + 1],
            bytes[codec::CHECKSUM_OFFSET + 2],
            bytes[codec::CHECKSUM_OFFSET + 3],
        ]);
        Self {
            stored,
            computed: codec::crc32(&bytes[..codec::CHECKSUM_OFFSET]),
        }
    }

    /// Whether the copy matches its own checksum.
    pub fn is_intact(&self) -> bool {
        self.stored == self.computed
    }
}

/// Result of reading back and checking both copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub primary: CopyStatus,
    pub backup: CopyStatus,
}

impl ValidationReport {
    /// Both copies hold identical content.
    pub fn copies_agree(&self) -> bool {
        self.primary.computed == self.backup.computed
    }

    /// Both copies are intact and agree.
    pub fn is_consistent(&self) -> bool {
        self.primary.is_intact() && self.backup.is_intact() && self.copies_agree()
    }

    /// The primary is intact and only the backup fails its checksum.
    pub fn only_backup_corrupt(&self) -> bool {
        self.primary.is_intact() && !self.backup.is_intact()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.primary.is_intact(), self.backup.is_intact()) {
            (true, true) if self.copies_agree() => write!(f, "primary and backup agree"),
            (true, true) => write!(f, "primary and backup differ"),
            (true, false) => write!(f, "backup copy is corrupt"),
            (false, true) => write!(f, "primary copy is corrupt"),
            (false, false) => write!(f, "both copies are corrupt"),
        }
    }
}

/// Releases eMMC boot partition write protection for its lifetime.
///
/// Protection is restored on drop, on every exit path of a write.
pub struct WriteProtectGuard {
    path: Option<PathBuf>,
}

impl WriteProtectGuard {
    /// Release protection if the device class needs it.
    ///
    /// Toggle failures are logged and otherwise ignored; the subsequent
    /// write fails on its own if the media stays read-only.
    pub fn release(device_type: StorageDevice, force_ro: &Path) -> Self {
        if !device_type.is_write_protected() {
            return Self { path: None };
        }

        match fs::write(force_ro, "0") {
            Ok(()) => {
                debug!(path = %force_ro.display(), "released boot partition write protection");
                Self {
                    path: Some(force_ro.to_path_buf()),
                }
            }
            Err(e) => {
                warn!(path = %force_ro.display(), error = %e, "could not release write protection");
                Self { path: None }
            }
        }
    }

    /// Whether protection was released and will be restored.
    pub fn is_released(&self) -> bool {
        self.path.is_some()
    }
}

impl Drop for WriteProtectGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match fs::write(&path, "1") {
                Ok(()) => debug!(path = %path.display(), "restored boot partition write protection"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not restore write protection"),
            }
        }
    }
}

/// Slot metadata record stored as primary + backup on raw media.
#[derive(Debug, Clone)]
pub struct BlockStore {
    descriptor: StoreDescriptor,
    force_ro: PathBuf,
}

impl BlockStore {
    /// Create a store over a resolved descriptor.
    pub fn new(descriptor: StoreDescriptor) -> Self {
        Self::with_force_ro(descriptor, DEFAULT_FORCE_RO_PATH)
    }

    /// Create a store with a custom write-protection switch.
    pub fn with_force_ro(descriptor: StoreDescriptor, force_ro: impl Into<PathBuf>) -> Self {
        Self {
            descriptor,
            force_ro: force_ro.into(),
        }
    }

    /// The resolved location.
    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    /// Read the primary copy.
    ///
    /// The checksum is not verified here.
    pub fn read_record(&self) -> Result<SlotRecord> {
        let bytes = read_copy(
            self.descriptor.primary_path(),
            self.descriptor.primary_offset(),
        )?;
        Ok(codec::decode_unverified(&bytes)?)
    }

    /// Write both copies and verify them.
    ///
    /// The copies already on media must be intact and agree before anything
    /// is written: `record` was derived from an unverified read of the
    /// primary, and writing it over a disagreeing backup would propagate
    /// whatever the primary held. The record's checksum is recomputed and
    /// stored back into `record`.
    pub fn write_record(&self, record: &mut SlotRecord) -> Result<()> {
        let before = self.validate()?;
        if !before.is_consistent() {
            if before.only_backup_corrupt() {
                warn!(
                    report = %before,
                    "backup corrupt, primary intact; refusing to write until the store is reprovisioned"
                );
            } else {
                warn!(report = %before, "refusing to overwrite inconsistent slot metadata");
            }
            return Err(StorageError::Corrupted(before));
        }
        self.provision_record(record)
    }

    /// Write both copies unconditionally, then verify them.
    ///
    /// Used to lay down a fresh record on blank media.
    pub fn provision_record(&self, record: &mut SlotRecord) -> Result<()> {
        record.checksum = codec::checksum(record);
        let bytes = codec::encode(record);

        {
            let _guard = WriteProtectGuard::release(self.descriptor.device_type, &self.force_ro);

            match &self.descriptor.layout {
                StoreLayout::OffsetPair { device, location } => {
                    let mut file = open_for_write(device)?;
                    write_at(&mut file, device, location.primary_offset(), &bytes)?;
                    write_at(&mut file, device, location.backup_offset(), &bytes)?;
                }
                StoreLayout::TwinPartition { primary, backup } => {
                    let mut file = open_for_write(primary)?;
                    write_at(&mut file, primary, 0, &bytes)?;
                    drop(file);

                    let mut file = open_for_write(backup)?;
                    write_at(&mut file, backup, 0, &bytes)?;
                }
            }
        }

        let report = self.validate()?;
        if !report.is_consistent() {
            warn!(%report, "slot metadata verification failed after write");
            return Err(StorageError::Corrupted(report));
        }

        info!(checksum = record.checksum, "slot metadata written");
        Ok(())
    }

    /// Read back both copies and check their checksums.
    pub fn validate(&self) -> Result<ValidationReport> {
        let primary = read_copy(
            self.descriptor.primary_path(),
            self.descriptor.primary_offset(),
        )?;
        let backup = read_copy(
            self.descriptor.backup_path(),
            self.descriptor.backup_offset(),
        )?;

        let report = ValidationReport {
            primary: CopyStatus::from_bytes(&primary),
            backup: CopyStatus::from_bytes(&backup),
        };
        debug!(%report, "validated slot metadata");
        Ok(report)
    }

    /// Read the backup copy, unverified.
    pub fn read_backup(&self) -> Result<SlotRecord> {
        let bytes = read_copy(
            self.descriptor.backup_path(),
            self.descriptor.backup_offset(),
        )?;
        Ok(codec::decode_unverified(&bytes)?)
    }
}

fn read_copy(path: &Path, offset: u64) -> Result<[u8; RECORD_SIZE]> {
    debug!(path = %path.display(), offset, "reading slot metadata");
    let mut file =
        File::open(path).map_err(|e| StorageError::io(format!("open {}", path.display()), e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError::io(format!("seek {} to {:#x}", path.display(), offset), e))?;

    let mut bytes = [0u8; RECORD_SIZE];
    file.read_exact(&mut bytes)
        .map_err(|e| StorageError::io(format!("read {} at {:#x}", path.display(), offset), e))?;
    Ok(bytes)
}

fn open_for_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| StorageError::io(format!("open {} for writing", path.display()), e))
}

fn write_at(file: &mut File, path: &Path, offset: u64, bytes: &[u8]) -> Result<()> {
    debug!(path = %path.display(), offset, "writing slot metadata");
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError::io(format!("seek {} to {:#x}", path.display(), offset), e))?;
    file.write_all(bytes)
        .map_err(|e| StorageError::io(format!("write {} at {:#x}", path.display(), offset), e))?;
    file.flush()
        .and_then(|()| file.sync_data())
        .map_err(|e| StorageError::io(format!("flush {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::backup_partition_path;
    use bootctl_core::{SmdLocation, MAX_PRIORITY};
    use tempfile::TempDir;

    fn twin_store(dir: &TempDir) -> BlockStore {
        let primary = dir.path().join("SMD");
        fs::write(&primary, codec::encode(&SlotRecord::factory())).unwrap();
        fs::write(backup_partition_path(&primary), codec::encode(&SlotRecord::factory())).unwrap();
        BlockStore::with_force_ro(StoreDescriptor::twin(primary), dir.path().join("force_ro"))
    }

    fn offset_store(dir: &TempDir, device_type: StorageDevice) -> BlockStore {
        let device = dir.path().join("mmcblk0boot0");
        fs::write(&device, vec![0u8; 64 * 1024]).unwrap();
        let location = SmdLocation {
            device_type,
            device_instance: 0,
            start_sector: 16,
            partition_size: 4096,
        };
        BlockStore::with_force_ro(
            StoreDescriptor::offset_pair(device, location),
            dir.path().join("force_ro"),
        )
    }

    #[test]
    fn test_read_factory_record() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);

        let record = store.read_record().unwrap();
        assert_eq!(record, SlotRecord::factory());
        assert!(store.validate().unwrap().is_consistent());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);

        let mut record = store.read_record().unwrap();
        record.slots[1].activate();
        store.write_record(&mut record).unwrap();

        let read = store.read_record().unwrap();
        assert_eq!(read, record);
        assert_eq!(read.slots[1].priority, MAX_PRIORITY);
        assert_eq!(store.read_backup().unwrap(), record);
    }

    #[test]
    fn test_write_recomputes_checksum() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);

        let mut record = store.read_record().unwrap();
        record.slots[0].mark_unbootable();
        record.checksum = 0;
        store.write_record(&mut record).unwrap();

        assert_eq!(record.checksum, codec::checksum(&record));
        let bytes = fs::read(store.descriptor().primary_path()).unwrap();
        assert!(codec::decode(&bytes).is_ok());
    }

    #[test]
    fn test_offset_pair_places_both_copies() {
        let dir = TempDir::new().unwrap();
        let store = offset_store(&dir, StorageDevice::QspiFlash);

        let mut record = SlotRecord::factory();
        store.provision_record(&mut record).unwrap();

        let image = fs::read(store.descriptor().primary_path()).unwrap();
        let primary = 16 * 512;
        let backup = primary + 4096;
        assert_eq!(&image[primary..primary + RECORD_SIZE], &codec::encode(&record));
        assert_eq!(&image[backup..backup + RECORD_SIZE], &codec::encode(&record));
        assert!(image[..primary].iter().all(|&b| b == 0));
        assert_eq!(image.len(), 64 * 1024);
    }

    #[test]
    fn test_corrupt_primary_still_reads() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);

        let path = store.descriptor().primary_path().to_path_buf();
        let mut bytes = fs::read(&path).unwrap();
        bytes[8] = 3;
        fs::write(&path, &bytes).unwrap();

        let record = store.read_record().unwrap();
        assert_eq!(record.slots[0].priority, 3);

        let report = store.validate().unwrap();
        assert!(!report.primary.is_intact());
        assert!(report.backup.is_intact());
        assert!(!report.is_consistent());
        assert_eq!(report.to_string(), "primary copy is corrupt");

        // Writing fails closed and leaves both copies untouched.
        let mut record = record;
        record.slots[1].mark_unbootable();
        let err = store.write_record(&mut record).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(store.read_backup().unwrap(), SlotRecord::factory());
    }

    #[test]
    fn test_corrupt_backup_blocks_write() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);

        let backup = store.descriptor().backup_path().to_path_buf();
        let mut bytes = fs::read(&backup).unwrap();
        bytes[13] ^= 0x01;
        fs::write(&backup, &bytes).unwrap();

        let mut record = store.read_record().unwrap();
        record.slots[0].mark_successful();
        match store.write_record(&mut record).unwrap_err() {
            StorageError::Corrupted(report) => {
                assert!(report.only_backup_corrupt());
                assert_eq!(report.to_string(), "backup copy is corrupt");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(&backup).unwrap(), bytes);
    }

    #[test]
    fn test_silent_write_corruption_detected() {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("qspi");
        fs::write(&device, vec![0u8; 4096]).unwrap();

        // Backup copy overlaps the tail of the primary copy.
        let location = SmdLocation {
            device_type: StorageDevice::QspiFlash,
            device_instance: 0,
            start_sector: 1,
            partition_size: 10,
        };
        let store = BlockStore::new(StoreDescriptor::offset_pair(&device, location));

        let mut record = SlotRecord::factory();
        let err = store.provision_record(&mut record).unwrap_err();
        match err {
            StorageError::Corrupted(report) => {
                assert!(!report.primary.is_intact());
                assert!(report.backup.is_intact());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_provision_blank_media() {
        let dir = TempDir::new().unwrap();
        let store = offset_store(&dir, StorageDevice::QspiFlash);
        assert!(!store.validate().unwrap().is_consistent());

        let mut record = SlotRecord::factory();
        assert!(matches!(
            store.write_record(&mut record),
            Err(StorageError::Corrupted(_))
        ));

        store.provision_record(&mut record).unwrap();
        assert!(store.validate().unwrap().is_consistent());
        assert_eq!(store.read_record().unwrap(), record);
    }

    #[test]
    fn test_write_fails_when_backup_unwritable() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("SMD");
        fs::write(&primary, codec::encode(&SlotRecord::factory())).unwrap();
        let store = BlockStore::new(StoreDescriptor::twin(&primary));

        let mut record = SlotRecord::factory();
        let err = store.write_record(&mut record).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_truncated_primary_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = twin_store(&dir);
        fs::write(store.descriptor().primary_path(), [0u8; 10]).unwrap();

        assert!(matches!(
            store.read_record(),
            Err(StorageError::Io { .. })
        ));
    }

    #[test]
    fn test_write_protect_released_and_restored() {
        let dir = TempDir::new().unwrap();
        let store = offset_store(&dir, StorageDevice::SdmmcBoot);
        let force_ro = dir.path().join("force_ro");
        fs::write(&force_ro, "1").unwrap();

        let mut record = SlotRecord::factory();
        store.provision_record(&mut record).unwrap();
        assert_eq!(fs::read_to_string(&force_ro).unwrap(), "1");
    }

    #[test]
    fn test_write_protect_restored_on_failure() {
        let dir = TempDir::new().unwrap();
        let force_ro = dir.path().join("force_ro");
        fs::write(&force_ro, "1").unwrap();
        let location = SmdLocation {
            device_type: StorageDevice::SdmmcBoot,
            device_instance: 0,
            start_sector: 1,
            partition_size: 512,
        };
        let store = BlockStore::with_force_ro(
            StoreDescriptor::offset_pair(dir.path().join("missing"), location),
            &force_ro,
        );

        let guard = WriteProtectGuard::release(StorageDevice::SdmmcBoot, &force_ro);
        assert!(guard.is_released());
        assert_eq!(fs::read_to_string(&force_ro).unwrap(), "0");
        drop(guard);

        let mut record = SlotRecord::factory();
        assert!(store.provision_record(&mut record).is_err());
        assert_eq!(fs::read_to_string(&force_ro).unwrap(), "1");
    }

    #[test]
    fn test_guard_skips_unprotected_devices() {
        let dir = TempDir::new().unwrap();
        let force_ro = dir.path().join("force_ro");
        let guard = WriteProtectGuard::release(StorageDevice::SdmmcUser, &force_ro);
        assert!(!guard.is_released());
        drop(guard);
        assert!(!force_ro.exists());
    }

    #[test]
    fn test_report_messages() {
        let good = CopyStatus {
            stored: 1,
            computed: 1,
        };
        let other = CopyStatus {
            stored: 2,
            computed: 2,
        };
        let bad = CopyStatus {
            stored: 1,
            computed: 3,
        };

        let agree = ValidationReport {
            primary: good,
            backup: good,
        };
        assert!(agree.is_consistent());

        let differ = ValidationReport {
            primary: good,
            backup: other,
        };
        assert!(!differ.is_consistent());
        assert!(!differ.only_backup_corrupt());
        assert_eq!(differ.to_string(), "primary and backup differ");

        let both = ValidationReport {
            primary: bad,
            backup: bad,
        };
        assert_eq!(both.to_string(), "both copies are corrupt");
        assert!(!both.only_backup_corrupt());
    }
}
