//! Block-level disk access.

pub mod block_id;
pub mod file_manager;

pub use block_id::BlockId;
pub use file_manager::{FileManager, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
