use thiserror::Error;

use hdc_store::StorageError;

/// Errors from container file encoding and decoding.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("invalid container magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u32),

    #[error("container checksum mismatch")]
    ChecksumMismatch,

    #[error("CRC32 mismatch for dataset {path}")]
    CrcMismatch { path: String },

    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for container file operations.
pub type FileResult<T> = Result<T, FileError>;
