//! Boot control configuration.

use crate::error::{BootControlError, Result};
use crate::platform::DEFAULT_COMPATIBLE_PATH;
use crate::properties::DEFAULT_CMDLINE_PATH;
use bootctl_storage::{DEFAULT_DEV_MEM_PATH, DEFAULT_EFIVARS_PATH, DEFAULT_FORCE_RO_PATH, DEFAULT_SMD_PATH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Pick from the detected platform.
    #[default]
    Auto,
    /// Slot metadata record on a block device.
    Block,
    /// Scratch register plus firmware variables.
    Register,
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "block" => Ok(Self::Block),
            "register" => Ok(Self::Register),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Block => write!(f, "block"),
            Self::Register => write!(f, "register"),
        }
    }
}

/// Host paths and overrides used when opening a [`crate::BootControl`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootControlConfig {
    /// Backend selection.
    pub backend: BackendChoice,
    /// Device-tree compatible list used for SoC detection.
    pub compatible_path: PathBuf,
    /// Primary slot metadata partition; the backup is `<smd_path>_b`.
    pub smd_path: PathBuf,
    /// eMMC boot partition write-protect switch.
    pub force_ro_path: PathBuf,
    /// Physical memory device for the scratch register.
    pub dev_mem_path: PathBuf,
    /// efivarfs mount point.
    pub efivars_path: PathBuf,
    /// Kernel command line.
    pub cmdline_path: PathBuf,
    /// Scratch register address, overriding the SoC default.
    pub register_address: Option<u64>,
    /// Query Android system properties with `getprop`.
    pub use_getprop: bool,
    /// Property overrides, consulted before any other source.
    pub properties: HashMap<String, String>,
}

impl Default for BootControlConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            compatible_path: PathBuf::from(DEFAULT_COMPATIBLE_PATH),
            smd_path: PathBuf::from(DEFAULT_SMD_PATH),
            force_ro_path: PathBuf::from(DEFAULT_FORCE_RO_PATH),
            dev_mem_path: PathBuf::from(DEFAULT_DEV_MEM_PATH),
            efivars_path: PathBuf::from(DEFAULT_EFIVARS_PATH),
            cmdline_path: PathBuf::from(DEFAULT_CMDLINE_PATH),
            register_address: None,
            use_getprop: true,
            properties: HashMap::new(),
        }
    }
}

impl BootControlConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| BootControlError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a JSON config.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
