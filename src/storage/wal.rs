//! Write-ahead log.
//!
//! The log is a sequence of [`LogPage`](crate::storage::page::LogPage) blocks in
//! one file. Records are opaque to this layer; callers get back an [`Lsn`] per
//! record and use it to tell buffers how far the log must be flushed before a
//! dirty page may be written.

pub mod iterator;
pub mod manager;

pub use iterator::BackwardLogIterator;
pub use manager::{LogManager, Lsn};
