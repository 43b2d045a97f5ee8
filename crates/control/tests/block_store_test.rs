use bootctl_control::{
    BackendChoice, BootControl, BootControlConfig, ErrorKind, FixedPlatform, SlotStateStore,
    SlotBackend, StaticProperties, BOOT_DEVICE_PROPERTY, SLOT_SUFFIX_PROPERTY,
};
use bootctl_core::{codec, SlotInfo, SlotRecord, SmdLocation, Soc, StorageDevice, Suffix, RECORD_SIZE};
use bootctl_storage::{InMemoryVariables, StoreLayout};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn config(dir: &Path) -> BootControlConfig {
    BootControlConfig {
        backend: BackendChoice::Block,
        smd_path: dir.join("SMD"),
        force_ro_path: dir.join("force_ro"),
        use_getprop: false,
        ..BootControlConfig::default()
    }
}

fn open_twin(dir: &Path, suffix: &str) -> BootControl {
    let props = StaticProperties::new().with(SLOT_SUFFIX_PROPERTY, suffix);
    BootControl::open_with(&config(dir), &FixedPlatform(Soc::T210), props, InMemoryVariables::new()).unwrap()
}

fn provision(control: &BootControl, mut record: SlotRecord) {
    match control.slot_backend() {
        SlotBackend::Block(store) => {
            let descriptor = store.store().descriptor();
            for path in [descriptor.primary_path(), descriptor.backup_path()] {
                if !path.exists() {
                    fs::write(path, vec![0u8; 4096]).unwrap();
                }
            }
            store.store().provision_record(&mut record).unwrap();
        }
        SlotBackend::Register(_) => panic!("expected block backend"),
    }
}

fn record(control: &BootControl) -> SlotRecord {
    match control.slot_backend() {
        SlotBackend::Block(store) => store.record().unwrap(),
        SlotBackend::Register(_) => panic!("expected block backend"),
    }
}

fn factory_twin(suffix: &str) -> (TempDir, BootControl) {
    let dir = TempDir::new().unwrap();
    let control = open_twin(dir.path(), suffix);
    provision(&control, SlotRecord::factory());
    (dir, control)
}

#[test]
fn test_factory_provisioned_store() {
    let (_dir, control) = factory_twin("_a");

    assert_eq!(control.backend(), BackendChoice::Block);
    assert_eq!(control.number_slots().unwrap(), 2);
    assert_eq!(control.current_slot().unwrap(), 0);
    assert!(control.is_slot_bootable(1).unwrap());
    assert!(control.is_slot_marked_successful(0).unwrap());
    assert_eq!(control.suffix(0).unwrap(), "_a");

    let record = record(&control);
    assert_eq!(record.slots[0].priority, 15);
    assert_eq!(record.slots[0].retry_count, 7);
    assert_eq!(record.slots[1].priority, 10);
    assert_eq!(record.slots[1].suffix, Suffix::B);
}

#[test]
fn test_stored_checksum_matches_contents() {
    let (dir, control) = factory_twin("_a");
    control.set_active_boot_slot(1).unwrap();
    control.set_slot_as_unbootable(0).unwrap();

    for path in [dir.path().join("SMD"), dir.path().join("SMD_b")] {
        let bytes = fs::read(&path).unwrap();
        let decoded = codec::decode(&bytes[..RECORD_SIZE]).unwrap();
        assert_eq!(decoded.checksum, codec::crc32(&bytes[..codec::CHECKSUM_OFFSET]));
    }
}

#[test]
fn test_write_then_read() {
    let dir = TempDir::new().unwrap();
    let control = open_twin(dir.path(), "_b");

    let mut written = SlotRecord::factory();
    written.slots[0] = SlotInfo {
        priority: 3,
        suffix: Suffix::A,
        retry_count: 2,
        boot_successful: false,
    };
    written.slots[1].priority = 12;
    provision(&control, written);

    let read = record(&control);
    assert_eq!(read.slots, written.slots);
    assert_eq!(read.magic, written.magic);
    assert_eq!(read.version, written.version);
    assert_eq!(read.num_slots, written.num_slots);
    assert_eq!(control.current_slot().unwrap(), 1);
}

#[test]
fn test_unbootable_from_any_state() {
    let states = [
        (15, 7, true),
        (14, 0, false),
        (1, 3, true),
        (0, 0, false),
        (0, 7, true),
    ];

    for (priority, retry_count, boot_successful) in states {
        let dir = TempDir::new().unwrap();
        let control = open_twin(dir.path(), "_a");
        let mut initial = SlotRecord::factory();
        initial.slots[1] = SlotInfo {
            priority,
            suffix: Suffix::B,
            retry_count,
            boot_successful,
        };
        provision(&control, initial);

        control.set_slot_as_unbootable(1).unwrap();
        assert!(!control.is_slot_bootable(1).unwrap());
        assert!(!control.is_slot_marked_successful(1).unwrap());
        assert_eq!(record(&control).slots[1].retry_count, 0);
    }
}

#[test]
fn test_set_active_from_current() {
    let (_dir, control) = factory_twin("_b");
    let before = record(&control);

    control.set_active_boot_slot(0).unwrap();
    let after = record(&control);

    assert_eq!(after.slots[0].priority, 15);
    assert_eq!(after.slots[0].retry_count, 7);
    assert!(!after.slots[0].boot_successful);

    assert_eq!(after.slots[1].priority, 14);
    assert_eq!(after.slots[1].suffix, before.slots[1].suffix);
    assert_eq!(after.slots[1].retry_count, before.slots[1].retry_count);
    assert_eq!(after.slots[1].boot_successful, before.slots[1].boot_successful);

    // The running slot does not change until the next boot.
    assert_eq!(control.current_slot().unwrap(), 1);
}

#[test]
fn test_out_of_range_slots() {
    let (dir, control) = factory_twin("_a");
    let before = fs::read(dir.path().join("SMD")).unwrap();

    for slot in [2, 3, u32::MAX] {
        assert_eq!(control.set_active_boot_slot(slot).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(control.set_slot_as_unbootable(slot).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(control.is_slot_bootable(slot).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(control.is_slot_marked_successful(slot).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(control.suffix(slot).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    assert_eq!(fs::read(dir.path().join("SMD")).unwrap(), before);
}

#[test]
fn test_single_slot_record() {
    let dir = TempDir::new().unwrap();
    let control = open_twin(dir.path(), "_a");
    let mut single = SlotRecord::factory();
    single.num_slots = 1;
    provision(&control, single);

    assert_eq!(control.number_slots().unwrap(), 1);
    assert!(control.is_slot_bootable(0).unwrap());
    assert_eq!(control.is_slot_bootable(1).unwrap_err().kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_corrupted_primary_reads_but_write_fails() {
    let (dir, control) = factory_twin("_a");
    let primary = dir.path().join("SMD");

    // Slot 1 priority byte, checksum left stale.
    let mut bytes = fs::read(&primary).unwrap();
    bytes[13] = 0;
    fs::write(&primary, &bytes).unwrap();

    assert!(!control.is_slot_bootable(1).unwrap());
    assert_eq!(control.current_slot().unwrap(), 0);

    let err = control.set_slot_as_unbootable(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
    let err = control.mark_boot_successful().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
}

#[test]
fn test_missing_backup_fails_write() {
    let (dir, control) = factory_twin("_a");
    fs::remove_file(dir.path().join("SMD_b")).unwrap();

    assert!(control.is_slot_bootable(0).unwrap());
    let err = control.set_active_boot_slot(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_missing_device() {
    let dir = TempDir::new().unwrap();
    let control = open_twin(dir.path(), "_a");
    assert_eq!(control.number_slots().unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(control.current_slot().unwrap_err().kind(), ErrorKind::Io);
}

fn boot_device(dir: &Path, location: SmdLocation) -> PathBuf {
    let path = dir.join("mmcblk0boot0");
    let mut bytes = vec![0u8; 16 * 1024];
    bytes[0x7DC..0x7DC + 12].copy_from_slice(&location.to_bytes());
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_offset_pair_layout() {
    let dir = TempDir::new().unwrap();
    let location = SmdLocation {
        device_type: StorageDevice::SdmmcBoot,
        device_instance: 0,
        start_sector: 16,
        partition_size: 2048,
    };
    let device = boot_device(dir.path(), location);
    fs::write(dir.path().join("force_ro"), "1").unwrap();

    let props = StaticProperties::new()
        .with(SLOT_SUFFIX_PROPERTY, "_a")
        .with(BOOT_DEVICE_PROPERTY, device.to_string_lossy());
    let control = BootControl::open_with(
        &config(dir.path()),
        &FixedPlatform(Soc::T194),
        props,
        InMemoryVariables::new(),
    )
    .unwrap();

    match control.slot_backend() {
        SlotBackend::Block(store) => assert!(matches!(
            store.store().descriptor().layout,
            StoreLayout::OffsetPair { .. }
        )),
        SlotBackend::Register(_) => panic!("expected block backend"),
    }

    provision(&control, SlotRecord::factory());
    control.set_active_boot_slot(1).unwrap();

    let bytes = fs::read(&device).unwrap();
    let primary = &bytes[16 * 512..16 * 512 + RECORD_SIZE];
    let backup = &bytes[16 * 512 + 2048..16 * 512 + 2048 + RECORD_SIZE];
    assert_eq!(primary, backup);
    assert_eq!(codec::decode(primary).unwrap().slots[1].priority, 15);

    // The BCT entry is untouched and write protection is back on.
    assert_eq!(&bytes[0x7DC..0x7DC + 12], &location.to_bytes());
    assert_eq!(fs::read_to_string(dir.path().join("force_ro")).unwrap(), "1");
}
