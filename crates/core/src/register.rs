//! Bit layout of the boot scratch register.
//!
//! ```text
//! 31            16 15             0
//! +---------------+---------------+
//! |  slot bits    |  0xFACE       |
//! +---------------+---------------+
//! ```
//!
//! Within the slot bits, bits 5:4 hold slot 0 and bits 3:2 hold slot 1. A
//! non-zero field means the slot still has boot attempts left.

/// Low half value marking the register as initialized.
pub const REGISTER_SENTINEL: u16 = 0xFACE;

/// Value historically reported when the register could not be read.
pub const UNAVAILABLE: u16 = 0xFFFF;

/// Only the low two bits of the retry budget are representable.
pub const RETRY_FIELD_MASK: u32 = 0x0003;

/// Raw 32-bit register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterState(pub u32);

impl RegisterState {
    /// Compose a register word from slot bits and the sentinel.
    pub fn new(bits: SlotBits) -> Self {
        Self((u32::from(bits.0) << 16) | u32::from(REGISTER_SENTINEL))
    }

    /// Check the sentinel in the low half.
    pub fn is_initialized(&self) -> bool {
        (self.0 & 0xFFFF) as u16 == REGISTER_SENTINEL
    }

    /// Slot bits stored in the high half.
    pub fn bits(&self) -> SlotBits {
        SlotBits((self.0 >> 16) as u16)
    }
}

/// The packed per-slot retry/bootable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotBits(pub u16);

impl SlotBits {
    /// Both slots seeded from the same retry budget.
    pub fn initial(retry_max: u32) -> Self {
        Self::default().with_retry(0, retry_max).with_retry(1, retry_max)
    }

    /// Mask of a slot's field, `None` for slots the register cannot hold.
    pub fn mask(slot: u32) -> Option<u16> {
        match slot {
            0 => Some(0x0030),
            1 => Some(0x000C),
            _ => None,
        }
    }

    fn shift(slot: u32) -> u32 {
        if slot == 0 {
            4
        } else {
            2
        }
    }

    /// Replace one slot's field with the low bits of `retry_max`.
    ///
    /// The other slot's field is untouched. Slots beyond the register's
    /// capacity leave the bits unchanged.
    pub fn with_retry(self, slot: u32, retry_max: u32) -> Self {
        let Some(mask) = Self::mask(slot) else {
            return self;
        };
        let field = ((retry_max & RETRY_FIELD_MASK) << Self::shift(slot)) as u16;
        Self((self.0 & !mask) | field)
    }

    /// Whether a slot's field is non-zero.
    pub fn is_bootable(&self, slot: u32) -> bool {
        Self::mask(slot).is_some_and(|mask| self.0 & mask != 0)
    }

    /// The two-bit retry field of a slot.
    pub fn retry_field(&self, slot: u32) -> u8 {
        match Self::mask(slot) {
            Some(mask) => ((self.0 & mask) >> Self::shift(slot)) as u8,
            None => 0,
        }
    }
}
