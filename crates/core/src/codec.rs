//! Packed little-endian encoding of [`SlotRecord`] with CRC-32 integrity.
//!
//! Layout (22 bytes):
//!
//! ```text
//! magic(4) | version(2) | num_slots(2) | 2 x [priority(1) suffix(2) retry(1) success(1)] | crc32(4)
//! ```
//!
//! The CRC is the standard (IEEE, zlib) CRC-32 over every byte before the
//! trailing checksum field.

use crate::record::{SlotInfo, SlotRecord, Suffix, MAX_SLOTS};
use thiserror::Error;

/// Size of one encoded slot entry.
pub const SLOT_INFO_SIZE: usize = 5;

/// Size of an encoded record.
pub const RECORD_SIZE: usize = 8 + MAX_SLOTS * SLOT_INFO_SIZE + 4;

/// Number of leading bytes covered by the checksum.
pub const CHECKSUM_OFFSET: usize = RECORD_SIZE - 4;

/// Record codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("wrong record size: expected {expected} bytes, got {actual}")]
    WrongSize { expected: usize, actual: usize },

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// CRC-32 of a byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Compute the checksum a record should carry, ignoring its current one.
pub fn checksum(record: &SlotRecord) -> u32 {
    crc32(&encode_raw(record)[..CHECKSUM_OFFSET])
}

/// Serialize a record, recomputing and embedding its checksum.
pub fn encode(record: &SlotRecord) -> [u8; RECORD_SIZE] {
    let mut bytes = encode_raw(record);
    let crc = crc32(&bytes[..CHECKSUM_OFFSET]);
    bytes[CHECKSUM_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    bytes
}

/// Serialize a record exactly as it is, including its stored checksum.
pub fn encode_raw(record: &SlotRecord) -> [u8; RECORD_SIZE] {
    let mut bytes = [0u8; RECORD_SIZE];
    bytes[0..4].copy_from_slice(&record.magic.to_le_bytes());
    bytes[4..6].copy_from_slice(&record.version.to_le_bytes());
    bytes[6..8].copy_from_slice(&record.num_slots.to_le_bytes());

    for (i, slot) in record.slots.iter().enumerate() {
        let at = 8 + i * SLOT_INFO_SIZE;
        bytes[at] = slot.priority;
        bytes[at + 1..at + 3].copy_from_slice(slot.suffix.as_bytes());
        bytes[at + 3] = slot.retry_count;
        bytes[at + 4] = u8::from(slot.boot_successful);
    }

    bytes[CHECKSUM_OFFSET..].copy_from_slice(&record.checksum.to_le_bytes());
    bytes
}

/// Deserialize a record and verify its checksum.
pub fn decode(bytes: &[u8]) -> Result<SlotRecord, CodecError> {
    let record = decode_unverified(bytes)?;
    let computed = crc32(&bytes[..CHECKSUM_OFFSET]);
    if record.checksum != computed {
        return Err(CodecError::ChecksumMismatch {
            stored: record.checksum,
            computed,
        });
    }
    Ok(record)
}

/// Deserialize a record checking only its size.
///
/// A structurally sized but corrupted record still decodes; the stored
/// checksum is carried through untouched.
pub fn decode_unverified(bytes: &[u8]) -> Result<SlotRecord, CodecError> {
    if bytes.len() != RECORD_SIZE {
        return Err(CodecError::WrongSize {
            expected: RECORD_SIZE,
            actual: bytes.len(),
        });
    }

    let mut slots = [SlotInfo::default(); MAX_SLOTS];
    for (i, slot) in slots.iter_mut().enumerate() {
        let at = 8 + i * SLOT_INFO_SIZE;
        *slot = SlotInfo {
            priority: bytes[at],
            suffix: Suffix([bytes[at + 1], bytes[at + 2]]),
            retry_count: bytes[at + 3],
            boot_successful: bytes[at + 4] != 0,
        };
    }

    Ok(SlotRecord {
        magic: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        version: u16::from_le_bytes([bytes[4], bytes[5]]),
        num_slots: u16::from_le_bytes([bytes[6], bytes[7]]),
        slots,
        checksum: u32::from_le_bytes([
            bytes[CHECKSUM_OFFSET],
            bytes[CHECKSUM_OFFSET + 1],
            bytes[CHECKSUM_OFFSET + 2],
            bytes[CHECKSUM_OFFSET + 3],
        ]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{SMD_MAGIC, SMD_VERSION};

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 22);
        assert_eq!(CHECKSUM_OFFSET, 18);
    }

    #[test]
    fn test_factory_layout() {
        let bytes = encode(&SlotRecord::factory());

        assert_eq!(&bytes[0..4], &[0x00, 0x4E, 0x42, 0x43]);
        assert_eq!(&bytes[4..6], &SMD_VERSION.to_le_bytes());
        assert_eq!(&bytes[6..8], &[2, 0]);
        assert_eq!(&bytes[8..13], &[15, b'_', b'a', 7, 1]);
        assert_eq!(&bytes[13..18], &[10, b'_', b'b', 7, 1]);
    }

    #[test]
    fn test_encode_embeds_checksum() {
        let mut record = SlotRecord::factory();
        record.slots[1].priority = 0;
        record.checksum = 0xDEAD_BEEF;

        let bytes = encode(&record);
        let stored = u32::from_le_bytes(bytes[18..22].try_into().unwrap());
        assert_eq!(stored, crc32(&bytes[..18]));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.checksum, stored);
        assert_eq!(decoded.slots, record.slots);
        assert_eq!(decoded.magic, SMD_MAGIC);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let mut bytes = encode(&SlotRecord::factory());
        bytes[8] ^= 0xFF;

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));

        // The unverified path still returns the flipped byte.
        let record = decode_unverified(&bytes).unwrap();
        assert_eq!(record.slots[0].priority, 15 ^ 0xFF);
    }

    #[test]
    fn test_decode_wrong_size() {
        let bytes = encode(&SlotRecord::factory());
        assert_eq!(
            decode(&bytes[..21]),
            Err(CodecError::WrongSize {
                expected: 22,
                actual: 21
            })
        );
        assert!(decode_unverified(&[0u8; 23]).is_err());
    }

    #[test]
    fn test_checksum_ignores_stored_value() {
        let mut record = SlotRecord::factory();
        let expected = checksum(&record);
        record.checksum = 0;
        assert_eq!(checksum(&record), expected);
    }

    #[test]
    fn test_encode_raw_keeps_checksum() {
        let mut record = SlotRecord::factory();
        record.checksum = 0x0102_0304;
        let bytes = encode_raw(&record);
        assert_eq!(&bytes[18..], &[0x04, 0x03, 0x02, 0x01]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_nonzero_success_byte_is_true() {
        let mut bytes = encode(&SlotRecord::factory());
        bytes[17] = 0x02;
        let record = decode_unverified(&bytes).unwrap();
        assert!(record.slots[1].boot_successful);
    }
}
