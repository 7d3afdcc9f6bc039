pub mod directory;
pub mod log_page;
pub mod type_tag;
pub mod typed_page;

use crate::storage::error::StorageResult;

/// A block-sized page that serializes its directory into its own tail.
pub trait Page {
    /// The raw block bytes. Only meaningful on disk after [`finish`](Page::finish).
    fn content(&self) -> &[u8];

    /// Serialize the directory into the tail of the block. Safe to call repeatedly.
    fn finish(&mut self);

    /// Replace the page state with the block serialized in `bytes`.
    fn decode_from(&mut self, bytes: Vec<u8>) -> StorageResult<()>;
}

pub use directory::{Directory, EntryTag, StartingOffsets};
pub use log_page::{BackwardRecordIterator, LogPage};
pub use type_tag::TypeTag;
pub use typed_page::{Field, ReadField, TypedPage};
