//! Log manager.
//!
//! Appends opaque records to the tail block of a single log file, rolling over
//! to a fresh block when the tail page is full, and writes the tail page to
//! disk on demand so buffers can honor write-ahead ordering.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use super::iterator::BackwardLogIterator;
use crate::storage::disk::{BlockId, FileManager};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::LogPage;

/// Log sequence number.
///
/// LSNs increase by one per appended record. `Lsn(0)` means "nothing logged yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    pub fn new() -> Self {
        Lsn(0)
    }

    pub fn next(&self) -> Self {
        Lsn(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSN({})", self.0)
    }
}

pub struct LogManager {
    file_manager: Arc<FileManager>,
    log_file: String,
    page: LogPage,
    current_block: BlockId,
    /// LSN of the most recently appended record.
    latest_lsn: Lsn,
    /// All records up to this LSN are on disk.
    last_saved_lsn: Lsn,
}

impl LogManager {
    /// Open the log in `log_file`, resuming appends in its last block if it has one.
    // TODO: persist the latest LSN so numbering continues across restarts
    // instead of starting again from zero.
    pub fn new(file_manager: Arc<FileManager>, log_file: impl Into<String>) -> StorageResult<Self> {
        let log_file = log_file.into();
        let block_count = file_manager.block_count(&log_file)?;

        let (current_block, page) = if block_count == 0 {
            let block = file_manager.append_empty_block(&log_file)?;
            debug!("starting log {} at {}", log_file, block);
            (block, LogPage::new(file_manager.block_size()))
        } else {
            let block = BlockId::new(log_file.as_str(), block_count - 1);
            let page = LogPage::from_bytes(file_manager.read_block(&block)?)?;
            debug!(
                "resuming log {} at {} with {} records",
                log_file,
                block,
                page.len()
            );
            (block, page)
        };

        Ok(Self {
            file_manager,
            log_file,
            page,
            current_block,
            latest_lsn: Lsn::new(),
            last_saved_lsn: Lsn::new(),
        })
    }

    /// Append `record` and return its LSN. The record is not durable until a
    /// flush covers the returned LSN.
    pub fn append(&mut self, record: &[u8]) -> StorageResult<Lsn> {
        let block_size = self.file_manager.block_size();
        if !LogPage::fits_in_empty_page(block_size, record.len()) {
            return Err(StorageError::RecordTooLarge {
                size: record.len(),
                capacity: block_size,
            });
        }

        if !self.page.append(record) {
            self.roll_over()?;
            if !self.page.append(record) {
                return Err(StorageError::RecordTooLarge {
                    size: record.len(),
                    capacity: block_size,
                });
            }
        }

        self.latest_lsn = self.latest_lsn.next();
        trace!("appended {} bytes as {}", record.len(), self.latest_lsn);
        Ok(self.latest_lsn)
    }

    /// Make sure every record up to `lsn` is on disk.
    pub fn flush(&mut self, lsn: Lsn) -> StorageResult<()> {
        if lsn >= self.last_saved_lsn {
            self.force_flush()?;
        }
        Ok(())
    }

    /// Write the tail page to its block regardless of what is already saved.
    pub fn force_flush(&mut self) -> StorageResult<()> {
        self.file_manager
            .write_page(&self.current_block, &mut self.page)?;
        self.last_saved_lsn = self.latest_lsn;
        trace!("log flushed through {} at {}", self.last_saved_lsn, self.current_block);
        Ok(())
    }

    /// Newest-first cursor over every record in the log. Flushes the tail page first.
    pub fn backward_iterator(&mut self) -> StorageResult<BackwardLogIterator> {
        self.force_flush()?;
        BackwardLogIterator::new(Arc::clone(&self.file_manager), self.current_block.clone())
    }

    pub fn latest_lsn(&self) -> Lsn {
        self.latest_lsn
    }

    pub fn last_saved_lsn(&self) -> Lsn {
        self.last_saved_lsn
    }

    pub fn current_block(&self) -> &BlockId {
        &self.current_block
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    fn roll_over(&mut self) -> StorageResult<()> {
        self.force_flush()?;
        let block = self.file_manager.append_empty_block(&self.log_file)?;
        debug!("log page full, rolling over from {} to {}", self.current_block, block);
        self.current_block = block;
        self.page = LogPage::new(self.file_manager.block_size());
        Ok(())
    }
}

impl fmt::Debug for LogManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogManager")
            .field("log_file", &self.log_file)
            .field("current_block", &self.current_block)
            .field("latest_lsn", &self.latest_lsn)
            .field("last_saved_lsn", &self.last_saved_lsn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const LOG_FILE: &str = "test.log";

    #[test]
    fn test_fresh_log_starts_with_one_block() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 128)?);
        let log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;

        assert_eq!(file_manager.block_count(LOG_FILE)?, 1);
        assert_eq!(log.current_block(), &BlockId::new(LOG_FILE, 0));
        assert_eq!(log.latest_lsn(), Lsn(0));
        assert_eq!(log.last_saved_lsn(), Lsn(0));
        Ok(())
    }

    #[test]
    fn test_append_assigns_increasing_lsns() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 128)?);
        let mut log = LogManager::new(file_manager, LOG_FILE)?;

        assert_eq!(log.append(b"first")?, Lsn(1));
        assert_eq!(log.append(b"second")?, Lsn(2));
        assert_eq!(log.latest_lsn(), Lsn(2));
        assert_eq!(log.last_saved_lsn(), Lsn(0));
        Ok(())
    }

    #[test]
    fn test_flush_covers_requested_lsn() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 128)?);
        let mut log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;

        let lsn = log.append(b"durable")?;
        log.flush(lsn)?;
        assert_eq!(log.last_saved_lsn(), lsn);

        let page = LogPage::from_bytes(file_manager.read_block(&BlockId::new(LOG_FILE, 0))?)?;
        assert_eq!(page.record_at(0), Some(b"durable".as_ref()));

        // an older watermark is already covered, so nothing is written
        log.append(b"pending")?;
        log.flush(Lsn(0))?;
        assert_eq!(log.last_saved_lsn(), lsn);
        let page = LogPage::from_bytes(file_manager.read_block(&BlockId::new(LOG_FILE, 0))?)?;
        assert_eq!(page.len(), 1);
        Ok(())
    }

    #[test]
    fn test_rollover_to_new_block() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 32)?);
        let mut log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;

        // each 10-byte record takes 14 bytes of a 32-byte page, so two fit per block
        for record in 0..5u8 {
            log.append(&[record; 10])?;
        }
        assert_eq!(log.current_block(), &BlockId::new(LOG_FILE, 2));
        assert_eq!(file_manager.block_count(LOG_FILE)?, 3);

        // full blocks were written out when the log moved past them
        let first = LogPage::from_bytes(file_manager.read_block(&BlockId::new(LOG_FILE, 0))?)?;
        assert_eq!(first.len(), 2);
        assert_eq!(first.record_at(1), Some([1u8; 10].as_ref()));
        Ok(())
    }

    #[test]
    fn test_record_too_large() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 32)?);
        let mut log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;

        log.append(b"small")?;
        let result = log.append(&[7u8; 27]);
        assert!(matches!(
            result,
            Err(StorageError::RecordTooLarge {
                size: 27,
                capacity: 32
            })
        ));

        // the refused record did not roll the log over or consume an LSN
        assert_eq!(log.latest_lsn(), Lsn(1));
        assert_eq!(file_manager.block_count(LOG_FILE)?, 1);

        // 26 bytes is the largest record an empty 32-byte page holds
        log.append(&[7u8; 26])?;
        assert_eq!(file_manager.block_count(LOG_FILE)?, 2);
        Ok(())
    }

    #[test]
    fn test_resume_from_last_block() -> Result<()> {
        let dir = tempdir()?;
        let file_manager = Arc::new(FileManager::new(dir.path(), 64)?);

        {
            let mut log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;
            log.append(b"one")?;
            log.append(b"two")?;
            log.force_flush()?;
        }

        let mut log = LogManager::new(Arc::clone(&file_manager), LOG_FILE)?;
        assert_eq!(file_manager.block_count(LOG_FILE)?, 1);
        log.append(b"three")?;

        let mut iter = log.backward_iterator()?;
        let mut records = Vec::new();
        while let Some(record) = iter.record() {
            records.push(record.to_vec());
            iter.previous()?;
        }
        assert_eq!(
            records,
            vec![b"three".to_vec(), b"two".to_vec(), b"one".to_vec()]
        );
        Ok(())
    }

    #[test]
    fn test_lsn_display() {
        assert_eq!(Lsn(42).to_string(), "LSN(42)");
        assert!(Lsn(1) < Lsn(2));
        assert_eq!(Lsn::new().next(), Lsn(1));
    }
}
