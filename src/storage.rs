//! Storage kernel for relstore.
//!
//! This module provides the block-oriented foundation higher layers build on:
//!
//! - **codec**: fixed-width little-endian integers and length-prefixed byte sequences
//! - **disk**: block identities and the file manager that reads and writes whole blocks
//! - **page**: typed pages and log pages, both described by a directory kept in the block tail
//! - **buffer**: a fixed pool of pinned pages with first-fit reassignment
//! - **wal**: the write-ahead log and its newest-first iterator
//!
//! A dirty buffer is only written after the log has been flushed through the
//! LSN that describes its change.

pub mod buffer;
pub mod codec;
pub mod disk;
pub mod error;
pub mod page;
pub mod wal;

pub use buffer::{Buffer, BufferManager, TransactionId};
pub use disk::{BlockId, FileManager, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{LogPage, Page, TypeTag, TypedPage};
pub use wal::{BackwardLogIterator, LogManager, Lsn};
