//! SoC generation detection and per-generation constants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tegra SoC generations this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Soc {
    T210,
    T186,
    T194,
    T234,
    T239,
    Unknown,
}

/// Detection order: the first compatible string found wins.
const COMPATIBLE_TABLE: [(&str, Soc); 5] = [
    ("nvidia,tegra194", Soc::T194),
    ("nvidia,tegra234", Soc::T234),
    ("nvidia,tegra239", Soc::T239),
    ("nvidia,tegra210", Soc::T210),
    ("nvidia,tegra186", Soc::T186),
];

impl Soc {
    /// Identify the SoC from a device-tree `compatible` blob.
    ///
    /// The blob is a NUL-separated list of strings; the search is a plain
    /// substring match over the whole blob.
    pub fn from_compatible(blob: &[u8]) -> Self {
        COMPATIBLE_TABLE
            .iter()
            .find(|(needle, _)| contains(blob, needle.as_bytes()))
            .map(|(_, soc)| *soc)
            .unwrap_or(Soc::Unknown)
    }

    /// Physical address of the boot scratch register.
    pub fn scratch_register_address(self) -> Option<u64> {
        match self {
            Soc::T186 => Some(0x0C39_0984),
            Soc::T194 => Some(0x0C39_041C),
            Soc::T234 | Soc::T239 => Some(0x0C39_03A8),
            Soc::T210 | Soc::Unknown => None,
        }
    }

    /// Offset of the slot metadata location inside the boot configuration
    /// table, for generations where the table is readable.
    pub fn bct_smd_offset(self) -> Option<u64> {
        match self {
            Soc::T186 => Some(0x664),
            Soc::T194 => Some(0x7DC),
            _ => None,
        }
    }

    /// Generations that boot through UEFI firmware variables only.
    pub fn is_uefi_only(self) -> bool {
        matches!(self, Soc::T234 | Soc::T239)
    }
}

impl fmt::Display for Soc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Soc::T210 => write!(f, "tegra210"),
            Soc::T186 => write!(f, "tegra186"),
            Soc::T194 => write!(f, "tegra194"),
            Soc::T234 => write!(f, "tegra234"),
            Soc::T239 => write!(f, "tegra239"),
            Soc::Unknown => write!(f, "unknown"),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
