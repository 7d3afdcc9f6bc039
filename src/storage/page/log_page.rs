use crate::storage::codec;
use crate::storage::error::StorageResult;
use crate::storage::page::directory::{Directory, TailPage};
use crate::storage::page::Page;

/// Append-only page of opaque log records.
///
/// Records are packed from the front; the directory of their starting offsets
/// is read backward so the newest record is iterated first.
#[derive(Debug, Clone)]
pub struct LogPage {
    inner: TailPage<()>,
}

impl LogPage {
    pub fn new(block_size: usize) -> Self {
        Self {
            inner: TailPage::new(block_size),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> StorageResult<Self> {
        Ok(Self {
            inner: TailPage::from_bytes(bytes)?,
        })
    }

    /// Whether a record of `record_len` bytes fits in an empty page of `block_size`.
    pub fn fits_in_empty_page(block_size: usize, record_len: usize) -> bool {
        codec::bytes_needed_for_sequence(record_len) + Directory::<()>::encoded_size_for(1)
            <= block_size
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.directory().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.directory().is_empty()
    }

    pub fn has_capacity_for(&self, record: &[u8]) -> bool {
        self.inner
            .has_capacity_for(codec::bytes_needed_for_sequence(record.len()))
    }

    /// Append `record`, or return `false` and leave the page untouched if it
    /// does not fit alongside the directory.
    pub fn append(&mut self, record: &[u8]) -> bool {
        self.inner
            .push((), codec::bytes_needed_for_sequence(record.len()), |buf, offset| {
                codec::encode_byte_sequence(record, buf, offset)
            })
            .is_ok()
    }

    /// Record `index` in append order.
    pub fn record_at(&self, index: usize) -> Option<&[u8]> {
        let offset = self.inner.directory().offset_at(index)?;
        Some(codec::decode_byte_sequence(self.inner.content(), offset).0)
    }

    /// Cursor over the records from newest to oldest.
    pub fn backward_iterator(&self) -> BackwardRecordIterator<'_> {
        BackwardRecordIterator {
            page: self,
            remaining: self.len(),
        }
    }
}

impl Page for LogPage {
    fn content(&self) -> &[u8] {
        self.inner.content()
    }

    fn finish(&mut self) {
        self.inner.finish();
    }

    fn decode_from(&mut self, bytes: Vec<u8>) -> StorageResult<()> {
        self.inner.decode_from(bytes)
    }
}

/// Newest-first cursor over one [`LogPage`]. Once exhausted it stays exhausted.
#[derive(Debug, Clone)]
pub struct BackwardRecordIterator<'a> {
    page: &'a LogPage,
    remaining: usize,
}

impl<'a> BackwardRecordIterator<'a> {
    pub fn is_valid(&self) -> bool {
        self.remaining > 0
    }

    /// Step to the next older record.
    pub fn previous(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// The record under the cursor, or `None` once exhausted.
    pub fn record(&self) -> Option<&'a [u8]> {
        let index = self.remaining.checked_sub(1)?;
        self.page.record_at(index)
    }
}
