use thiserror::Error;

use crate::core::package::PackageState;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Operation '{operation}' not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PackageState,
    },

    #[error("Invalid buffer size bound: {0}")]
    BufferSizeInvalid(usize),

    #[error("Compression failed: {0}")]
    CompressFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressFailed(String),

    #[error("Write to stream failed at offset {offset}: {source}")]
    IoWriteFailed {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from stream failed at offset {offset}: {source}")]
    IoReadFailed {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognized package magic: {0:#010x}")]
    FormatUnrecognized(u32),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackageError>;
