//! Firmware (UEFI) variable access.
//!
//! Variables are addressed by vendor GUID and name. The efivarfs
//! implementation stores each variable as `<root>/<Name>-<guid>`, a file
//! holding four little-endian attribute bytes followed by the payload.

use crate::error::{Result, StorageError};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uguid::{guid, Guid};

/// Vendor namespace of the boot chain variables.
pub const NVIDIA_PUBLIC_VARIABLE_GUID: Guid = guid!("781e084c-a330-417c-b678-38e696380cb9");

/// Default efivarfs mount point.
pub const DEFAULT_EFIVARS_PATH: &str = "/sys/firmware/efi/efivars";

/// Variable survives a reset.
pub const EFI_VARIABLE_NON_VOLATILE: u32 = 0x0000_0001;
/// Variable is visible before ExitBootServices.
pub const EFI_VARIABLE_BOOTSERVICE_ACCESS: u32 = 0x0000_0002;
/// Variable is visible to the OS.
pub const EFI_VARIABLE_RUNTIME_ACCESS: u32 = 0x0000_0004;

/// Attributes used for every variable written by bootctl.
pub const DEFAULT_ATTRIBUTES: u32 =
    EFI_VARIABLE_NON_VOLATILE | EFI_VARIABLE_BOOTSERVICE_ACCESS | EFI_VARIABLE_RUNTIME_ACCESS;

/// A firmware variable as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub attributes: u32,
    pub data: Vec<u8>,
}

impl Variable {
    /// Payload as a little-endian `u32`, `None` unless exactly four bytes.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// Platform firmware variable store.
pub trait FirmwareVariables {
    /// Read a variable, `None` if it does not exist.
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>>;

    /// Create or replace a variable.
    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()>;

    /// Read a `u32` variable. A payload of the wrong length counts as absent.
    fn get_u32(&self, vendor: &Guid, name: &str) -> Result<Option<u32>> {
        let Some(variable) = self.get_variable(vendor, name)? else {
            return Ok(None);
        };
        let value = variable.as_u32();
        if value.is_none() {
            debug!(name, len = variable.data.len(), "ignoring variable with unexpected size");
        }
        Ok(value)
    }

    /// Write a `u32` variable with the default attributes.
    fn set_u32(&self, vendor: &Guid, name: &str, value: u32) -> Result<()> {
        self.set_variable(vendor, name, &value.to_le_bytes(), DEFAULT_ATTRIBUTES)
    }
}

impl<T: FirmwareVariables + ?Sized> FirmwareVariables for &T {
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>> {
        (**self).get_variable(vendor, name)
    }

    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()> {
        (**self).set_variable(vendor, name, data, attributes)
    }
}

impl<T: FirmwareVariables + ?Sized> FirmwareVariables for Box<T> {
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>> {
        (**self).get_variable(vendor, name)
    }

    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()> {
        (**self).set_variable(vendor, name, data, attributes)
    }
}

impl<T: FirmwareVariables + ?Sized> FirmwareVariables for Arc<T> {
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>> {
        (**self).get_variable(vendor, name)
    }

    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()> {
        (**self).set_variable(vendor, name, data, attributes)
    }
}

/// Variables exposed through a mounted efivarfs.
#[derive(Debug, Clone)]
pub struct EfivarFs {
    root: PathBuf,
}

impl EfivarFs {
    /// Use the default mount point.
    pub fn new() -> Self {
        Self::with_root(DEFAULT_EFIVARS_PATH)
    }

    /// Use a custom mount point.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File backing a variable.
    pub fn variable_path(&self, vendor: &Guid, name: &str) -> PathBuf {
        self.root.join(format!("{}-{}", name, vendor))
    }
}

impl Default for EfivarFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareVariables for EfivarFs {
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>> {
        let path = self.variable_path(vendor, name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(format!("read {}", path.display()), e)),
        };

        let Some((attributes, data)) = bytes.split_first_chunk::<4>() else {
            warn!(path = %path.display(), "variable file too short for attributes");
            return Ok(None);
        };

        Ok(Some(Variable {
            attributes: u32::from_le_bytes(*attributes),
            data: data.to_vec(),
        }))
    }

    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()> {
        let path = self.variable_path(vendor, name);
        if path.exists() {
            clear_immutable(&path);
        }

        let mut buf = Vec::with_capacity(4 + data.len());
        buf.extend_from_slice(&attributes.to_le_bytes());
        buf.extend_from_slice(data);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o644)
            .open(&path)
            .map_err(|e| StorageError::io(format!("open {}", path.display()), e))?;

        // efivarfs requires attributes and payload in a single write.
        let written = file
            .write(&buf)
            .map_err(|e| StorageError::io(format!("write {}", path.display()), e))?;
        if written != buf.len() {
            return Err(StorageError::io(
                format!("write {}", path.display()),
                io::Error::new(io::ErrorKind::WriteZero, "short variable write"),
            ));
        }

        debug!(name, len = data.len(), attributes, "set firmware variable");
        Ok(())
    }
}

/// efivarfs marks variable files immutable; lift that before rewriting.
///
/// Failures are ignored: on other filesystems the ioctl is unsupported and
/// the subsequent open reports any real permission problem.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn clear_immutable(path: &Path) {
    use std::os::unix::io::AsRawFd;

    const FS_IMMUTABLE_FL: libc::c_int = 0x0000_0010;
    #[cfg(target_pointer_width = "64")]
    const FS_IOC_GETFLAGS: u32 = 0x8008_6601;
    #[cfg(target_pointer_width = "64")]
    const FS_IOC_SETFLAGS: u32 = 0x4008_6602;
    #[cfg(target_pointer_width = "32")]
    const FS_IOC_GETFLAGS: u32 = 0x8004_6601;
    #[cfg(target_pointer_width = "32")]
    const FS_IOC_SETFLAGS: u32 = 0x4004_6602;

    let Ok(file) = fs::File::open(path) else {
        return;
    };
    let fd = file.as_raw_fd();
    let mut flags: libc::c_int = 0;

    // SAFETY: `fd` is open for the duration of both calls and `flags` is a
    // valid c_int the kernel reads or writes.
    unsafe {
        if libc::ioctl(fd, FS_IOC_GETFLAGS as _, &mut flags as *mut libc::c_int) != 0 {
            return;
        }
        if flags & FS_IMMUTABLE_FL == 0 {
            return;
        }
        flags &= !FS_IMMUTABLE_FL;
        if libc::ioctl(fd, FS_IOC_SETFLAGS as _, &flags as *const libc::c_int) != 0 {
            debug!(path = %path.display(), "could not clear immutable flag");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn clear_immutable(_path: &Path) {}

/// Variables held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryVariables {
    vars: Mutex<HashMap<(Guid, String), Variable>>,
    reject_writes: AtomicBool,
}

impl InMemoryVariables {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a `u32` variable.
    pub fn with_u32(self, vendor: Guid, name: &str, value: u32) -> Self {
        self.insert(vendor, name, value.to_le_bytes().to_vec());
        self
    }

    /// Seed a raw variable.
    pub fn insert(&self, vendor: Guid, name: &str, data: Vec<u8>) {
        let mut vars = self.vars.lock().unwrap_or_else(|e| e.into_inner());
        vars.insert(
            (vendor, name.to_string()),
            Variable {
                attributes: DEFAULT_ATTRIBUTES,
                data,
            },
        );
    }

    /// Remove a variable.
    pub fn remove(&self, vendor: Guid, name: &str) {
        let mut vars = self.vars.lock().unwrap_or_else(|e| e.into_inner());
        vars.remove(&(vendor, name.to_string()));
    }

    /// Make every subsequent write fail with a permission error.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl FirmwareVariables for InMemoryVariables {
    fn get_variable(&self, vendor: &Guid, name: &str) -> Result<Option<Variable>> {
        let vars = self.vars.lock().unwrap_or_else(|e| e.into_inner());
        Ok(vars.get(&(*vendor, name.to_string())).cloned())
    }

    fn set_variable(&self, vendor: &Guid, name: &str, data: &[u8], attributes: u32) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::io(
                format!("set variable {}", name),
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        let mut vars = self.vars.lock().unwrap_or_else(|e| e.into_inner());
        vars.insert(
            (*vendor, name.to_string()),
            Variable {
                attributes,
                data: data.to_vec(),
            },
        );
        Ok(())
    }
}
