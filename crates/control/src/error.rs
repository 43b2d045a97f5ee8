//! Boot control errors.

use bootctl_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during boot control operations.
#[derive(Debug, Error)]
pub enum BootControlError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("slot {slot} out of range ({num_slots} slots)")]
    OutOfRange { slot: u32, num_slots: u32 },

    #[error("no slot matches running suffix {0:?}")]
    UnknownSuffix(String),

    #[error("firmware variable {0} not found")]
    VariableNotFound(&'static str),

    #[error("scratch register at {address:#x} unavailable: {source}")]
    RegisterUnavailable {
        address: u64,
        #[source]
        source: StorageError,
    },

    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Coarse classification of a [`BootControlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open/seek/read/write/map failure.
    Io,
    /// Checksum mismatch or primary/backup disagreement.
    Corruption,
    /// Missing firmware variable or unmatched slot suffix.
    NotFound,
    /// A required resource could not be obtained.
    Unavailable,
    /// Slot index beyond the number of slots.
    OutOfRange,
    /// Bad configuration.
    Config,
}

impl BootControlError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(StorageError::Io { .. }) => ErrorKind::Io,
            Self::Storage(StorageError::MisalignedRegister(_)) => ErrorKind::Io,
            Self::Storage(StorageError::Codec(_)) => ErrorKind::Corruption,
            Self::Storage(StorageError::Corrupted(_)) => ErrorKind::Corruption,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::UnknownSuffix(_) | Self::VariableNotFound(_) => ErrorKind::NotFound,
            Self::RegisterUnavailable { .. } | Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::ConfigRead { .. } | Self::ConfigParse(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootControlError>;
