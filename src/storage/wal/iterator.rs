use std::sync::Arc;

use log::trace;

use crate::storage::disk::{BlockId, FileManager};
use crate::storage::error::StorageResult;
use crate::storage::page::LogPage;

/// Newest-first cursor over every record of a log file.
///
/// Walks the records of one block from last to first, then loads the
/// preceding block and continues, until block 0 is exhausted. Empty blocks
/// are skipped. Exhaustion is permanent; ask the log manager for a new
/// iterator to traverse again.
#[derive(Debug)]
pub struct BackwardLogIterator {
    file_manager: Arc<FileManager>,
    block: BlockId,
    page: LogPage,
    /// Records of `page` not yet stepped past; the cursor sits on index `remaining - 1`.
    remaining: usize,
}

impl BackwardLogIterator {
    /// Position the cursor on the newest record at or before `block`.
    pub fn new(file_manager: Arc<FileManager>, block: BlockId) -> StorageResult<Self> {
        let page = LogPage::from_bytes(file_manager.read_block(&block)?)?;
        let mut iter = Self {
            file_manager,
            block,
            remaining: page.len(),
            page,
        };
        iter.skip_exhausted_blocks()?;
        Ok(iter)
    }

    pub fn is_valid(&self) -> bool {
        self.remaining > 0
    }

    /// The record under the cursor, or `None` once the log is exhausted.
    pub fn record(&self) -> Option<&[u8]> {
        let index = self.remaining.checked_sub(1)?;
        self.page.record_at(index)
    }

    /// Step to the next older record, loading earlier blocks as needed.
    pub fn previous(&mut self) -> StorageResult<()> {
        self.remaining = self.remaining.saturating_sub(1);
        self.skip_exhausted_blocks()
    }

    /// Block the cursor is currently reading.
    pub fn block(&self) -> &BlockId {
        &self.block
    }

    fn skip_exhausted_blocks(&mut self) -> StorageResult<()> {
        while self.remaining == 0 {
            let previous = match self.block.previous() {
                Some(previous) => previous,
                None => break,
            };
            let page = LogPage::from_bytes(self.file_manager.read_block(&previous)?)?;
            trace!("log iterator moved to {} with {} records", previous, page.len());
            self.remaining = page.len();
            self.page = page;
            self.block = previous;
        }
        Ok(())
    }
}
