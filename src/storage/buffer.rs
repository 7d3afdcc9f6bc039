pub mod replacer;

use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use replacer::{FirstFitReplacer, FrameId, Replacer};

use crate::storage::disk::{BlockId, FileManager};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::TypedPage;
use crate::storage::wal::{LogManager, Lsn};

/// Identifier of the transaction that dirtied a buffer.
pub type TransactionId = u64;

/// One block-sized frame of the buffer pool.
///
/// Holds the page of whichever block it is currently assigned to, plus the
/// bookkeeping needed to write that page back without breaking write-ahead
/// ordering.
pub struct Buffer {
    file_manager: Arc<FileManager>,
    log_manager: Arc<Mutex<LogManager>>,
    page: TypedPage,
    block_id: Option<BlockId>,
    pins: usize,
    /// Set while the page holds changes that are not on disk yet.
    transaction: Option<TransactionId>,
    /// Highest LSN describing a change to this page.
    lsn: Lsn,
}

impl Buffer {
    pub fn new(file_manager: Arc<FileManager>, log_manager: Arc<Mutex<LogManager>>) -> Self {
        let page = TypedPage::new(file_manager.block_size());
        Self {
            file_manager,
            log_manager,
            page,
            block_id: None,
            pins: 0,
            transaction: None,
            lsn: Lsn::new(),
        }
    }

    pub fn page(&self) -> &TypedPage {
        &self.page
    }

    /// Mutable access to the page. Call [`set_modified`](Self::set_modified)
    /// after changing it so the change gets written back.
    pub fn page_mut(&mut self) -> &mut TypedPage {
        &mut self.page
    }

    pub fn block_id(&self) -> Option<&BlockId> {
        self.block_id.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn pin_count(&self) -> usize {
        self.pins
    }

    pub fn modifying_transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    /// Record that `transaction` changed the page, described by the log record at `lsn`.
    pub fn set_modified(&mut self, transaction: TransactionId, lsn: Lsn) {
        self.transaction = Some(transaction);
        self.lsn = self.lsn.max(lsn);
    }

    /// Write pending changes back to the assigned block, then load `block`.
    pub fn assign_to_block(&mut self, block: BlockId) -> StorageResult<()> {
        self.flush()?;
        self.file_manager.read_into(&block, &mut self.page)?;
        self.block_id = Some(block);
        self.pins = 0;
        Ok(())
    }

    /// Write the page back if it is dirty. The log is flushed through the
    /// page's LSN before the page itself is written.
    pub fn flush(&mut self) -> StorageResult<()> {
        let transaction = match self.transaction {
            Some(transaction) => transaction,
            None => return Ok(()),
        };

        self.log_manager.lock().flush(self.lsn)?;
        if let Some(block) = self.block_id.as_ref() {
            self.file_manager.write_page(block, &mut self.page)?;
            debug!(
                "flushed {} dirtied by transaction {} through {}",
                block, transaction, self.lsn
            );
        }
        self.transaction = None;
        Ok(())
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        assert!(self.pins > 0, "unpin of an unpinned buffer");
        self.pins -= 1;
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("block_id", &self.block_id)
            .field("pins", &self.pins)
            .field("transaction", &self.transaction)
            .field("lsn", &self.lsn)
            .finish()
    }
}

/// Fixed pool of buffers shared by every caller.
///
/// Buffers are lent out through [`pin`](Self::pin) and returned through
/// [`unpin`](Self::unpin). A pinned buffer is never reassigned.
///
/// Release any lock held on a buffer or on the log manager before calling
/// back into the manager: flushing a dirty buffer locks the log manager while
/// the buffer is locked.
pub struct BufferManager {
    pool: Vec<Arc<Mutex<Buffer>>>,
    available: usize,
    replacer: Box<dyn Replacer>,
}

impl BufferManager {
    pub fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<Mutex<LogManager>>,
        pool_size: usize,
    ) -> Self {
        Self::with_replacer(
            file_manager,
            log_manager,
            pool_size,
            Box::new(FirstFitReplacer::new(pool_size)),
        )
    }

    pub fn with_replacer(
        file_manager: Arc<FileManager>,
        log_manager: Arc<Mutex<LogManager>>,
        pool_size: usize,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        let pool = (0..pool_size)
            .map(|_| {
                Arc::new(Mutex::new(Buffer::new(
                    Arc::clone(&file_manager),
                    Arc::clone(&log_manager),
                )))
            })
            .collect();
        Self {
            pool,
            available: pool_size,
            replacer,
        }
    }

    /// Number of buffers nobody has pinned.
    pub fn available(&self) -> usize {
        self.available
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Pin the buffer holding `block`, assigning an unpinned buffer to it if
    /// no buffer holds it yet. Fails with [`StorageError::NoBufferAvailable`]
    /// when every buffer is pinned.
    pub fn pin(&mut self, block: &BlockId) -> StorageResult<Arc<Mutex<Buffer>>> {
        if let Some(frame_id) = self.find_existing(block) {
            let buffer = Arc::clone(&self.pool[frame_id]);
            let mut guard = buffer.lock();
            if !guard.is_pinned() {
                self.available -= 1;
                self.replacer.pin(frame_id);
            }
            guard.pin();
            drop(guard);
            return Ok(buffer);
        }

        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => {
                debug!("no unpinned buffer for {}", block);
                return Err(StorageError::NoBufferAvailable);
            }
        };

        let buffer = Arc::clone(&self.pool[frame_id]);
        let mut guard = buffer.lock();
        if let Some(previous) = guard.block_id() {
            debug!("reassigning buffer {} from {} to {}", frame_id, previous, block);
        }
        if let Err(e) = guard.assign_to_block(block.clone()) {
            self.replacer.unpin(frame_id);
            return Err(e);
        }
        guard.pin();
        self.available -= 1;
        drop(guard);
        Ok(buffer)
    }

    /// Release one pin on `buffer`. The buffer becomes reassignable once its
    /// last pin is released.
    pub fn unpin(&mut self, buffer: &Arc<Mutex<Buffer>>) {
        let frame_id = match self.frame_of(buffer) {
            Some(frame_id) => frame_id,
            None => panic!("unpin of a buffer from another pool"),
        };
        let mut guard = buffer.lock();
        guard.unpin();
        if !guard.is_pinned() {
            self.available += 1;
            self.replacer.unpin(frame_id);
        }
    }

    /// Write back every buffer dirtied by `transaction`.
    pub fn flush_all(&mut self, transaction: TransactionId) -> StorageResult<()> {
        for buffer in &self.pool {
            let mut guard = buffer.lock();
            if guard.modifying_transaction() == Some(transaction) {
                guard.flush()?;
            }
        }
        Ok(())
    }

    fn find_existing(&self, block: &BlockId) -> Option<FrameId> {
        self.pool
            .iter()
            .position(|buffer| buffer.lock().block_id() == Some(block))
    }

    fn frame_of(&self, buffer: &Arc<Mutex<Buffer>>) -> Option<FrameId> {
        self.pool.iter().position(|frame| Arc::ptr_eq(frame, buffer))
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("pool_size", &self.pool.len())
            .field("available", &self.available)
            .field("replacer", &self.replacer)
            .finish()
    }
}
