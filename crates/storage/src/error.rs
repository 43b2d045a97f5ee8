//! Storage errors.

use crate::block::ValidationReport;
use bootctl_core::CodecError;
use std::io;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Record error: {0}")]
    Codec(#[from] CodecError),

    #[error("Slot metadata failed verification: {0}")]
    Corrupted(ValidationReport),

    #[error("Register address {0:#x} is not 32-bit aligned")]
    MisalignedRegister(u64),
}

impl StorageError {
    /// Wrap an I/O error with a description of the step that failed.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
