//! Storage layer error types.

use thiserror::Error;

use crate::storage::disk::{BlockId, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::storage::page::TypeTag;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Index out of bounds: index {index}, directory length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Type mismatch at index {index}: expected {expected}, actual {actual}")]
    TypeMismatch {
        index: usize,
        expected: TypeTag,
        actual: TypeTag,
    },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Field {index} cannot grow in place: requires {required} bytes but only {reserved} reserved")]
    FieldOverflow {
        index: usize,
        required: usize,
        reserved: usize,
    },

    #[error("Byte sequence of {len} bytes exceeds the 16-bit length prefix")]
    SequenceTooLong { len: usize },

    #[error("Log record of {size} bytes does not fit in an empty log page of {capacity} bytes")]
    RecordTooLarge { size: usize, capacity: usize },

    #[error("No buffer available for pinning")]
    NoBufferAvailable,

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Unknown type tag code: {0}")]
    UnknownTypeTag(u8),

    #[error("Corrupted page: {0}")]
    CorruptedPage(String),

    #[error("Invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Block data must be {expected} bytes, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error(
        "Invalid block size: {0} (must be between {min} and {max})",
        min = MIN_BLOCK_SIZE,
        max = MAX_BLOCK_SIZE
    )]
    InvalidBlockSize(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
