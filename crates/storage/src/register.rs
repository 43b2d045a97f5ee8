//! Memory-mapped access to the 32-bit boot scratch register.
//!
//! Each access maps the page holding the register through the physical
//! memory device, touches the word with a volatile access and unmaps again
//! before returning.

use crate::error::{Result, StorageError};
use memmap2::MmapOptions;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Physical memory device.
pub const DEFAULT_DEV_MEM_PATH: &str = "/dev/mem";

const WORD: usize = std::mem::size_of::<u32>();

/// A single 32-bit register at a fixed physical address.
#[derive(Debug, Clone)]
pub struct ScratchRegister {
    mem_path: PathBuf,
    address: u64,
}

impl ScratchRegister {
    /// Register at `address` behind `/dev/mem`.
    pub fn new(address: u64) -> Self {
        Self::with_mem_path(DEFAULT_DEV_MEM_PATH, address)
    }

    /// Register at `address` behind a custom memory device.
    pub fn with_mem_path(mem_path: impl Into<PathBuf>, address: u64) -> Self {
        Self {
            mem_path: mem_path.into(),
            address,
        }
    }

    /// Physical address of the register.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Read the raw register word.
    pub fn read(&self) -> Result<u32> {
        self.check_alignment()?;
        let file = open_mem(&self.mem_path, false)?;
        self.check_bounds(&file)?;

        // SAFETY: the mapping is private to this call and only accessed
        // through a single aligned volatile read below.
        let map = unsafe {
            MmapOptions::new()
                .offset(self.address)
                .len(WORD)
                .map(&file)
        }
        .map_err(|e| self.map_error(e))?;

        // SAFETY: `map` is at least one word long and the address is word
        // aligned; memmap2 preserves the in-page offset of `address`.
        let value = unsafe { std::ptr::read_volatile(map.as_ptr().cast::<u32>()) };
        debug!(address = self.address, value, "read scratch register");
        Ok(value)
    }

    /// Write the raw register word.
    pub fn write(&self, value: u32) -> Result<()> {
        self.check_alignment()?;
        let file = open_mem(&self.mem_path, true)?;
        self.check_bounds(&file)?;

        // SAFETY: as in `read`, the mapping lives only for this call.
        let mut map = unsafe {
            MmapOptions::new()
                .offset(self.address)
                .len(WORD)
                .map_mut(&file)
        }
        .map_err(|e| self.map_error(e))?;

        // SAFETY: see `read`.
        unsafe { std::ptr::write_volatile(map.as_mut_ptr().cast::<u32>(), value) };
        debug!(address = self.address, value, "wrote scratch register");
        Ok(())
    }

    fn check_alignment(&self) -> Result<()> {
        if self.address % WORD as u64 != 0 {
            return Err(StorageError::MisalignedRegister(self.address));
        }
        Ok(())
    }

    /// A regular file standing in for the memory device must cover the
    /// register; touching a mapping past its end faults instead of failing.
    fn check_bounds(&self, file: &File) -> Result<()> {
        let metadata = file
            .metadata()
            .map_err(|e| StorageError::io(format!("stat {}", self.mem_path.display()), e))?;
        if metadata.is_file() && metadata.len() < self.address + WORD as u64 {
            return Err(self.map_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file is only {} bytes", metadata.len()),
            )));
        }
        Ok(())
    }

    fn map_error(&self, e: io::Error) -> StorageError {
        StorageError::io(
            format!(
                "map {} at {:#x}",
                self.mem_path.display(),
                self.address
            ),
            e,
        )
    }
}

fn open_mem(path: &Path, write: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(libc::O_SYNC)
        .open(path)
        .map_err(|e| StorageError::io(format!("open {}", path.display()), e))
}
