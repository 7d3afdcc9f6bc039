use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::trace;
use parking_lot::Mutex;

use crate::storage::codec::{U16_SIZE, U8_SIZE};
use crate::storage::disk::BlockId;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::Page;

/// Largest block size a page can address with 16-bit offsets.
pub const MAX_BLOCK_SIZE: usize = u16::MAX as usize;

/// Smallest block that holds one typed directory entry (offset and tag) plus the entry count.
pub const MIN_BLOCK_SIZE: usize = U16_SIZE + U8_SIZE + U16_SIZE;

/// Reads and writes fixed-size blocks of files inside one database directory.
///
/// Files are opened lazily on first use and kept open until the manager is
/// dropped. Every write is synced before returning.
#[derive(Debug)]
pub struct FileManager {
    db_directory: PathBuf,
    block_size: usize,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    pub fn new(db_directory: impl AsRef<Path>, block_size: usize) -> StorageResult<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(StorageError::InvalidBlockSize(block_size));
        }

        let db_directory = db_directory.as_ref().to_path_buf();
        fs::create_dir_all(&db_directory)?;

        Ok(Self {
            db_directory,
            block_size,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn db_directory(&self) -> &Path {
        &self.db_directory
    }

    /// Read the raw bytes of `block`. Fails with [`StorageError::BlockNotFound`]
    /// if the block lies beyond the end of its file.
    pub fn read_block(&self, block: &BlockId) -> StorageResult<Vec<u8>> {
        let mut open_files = self.open_files.lock();
        let file = self.file_for(&mut open_files, block.file_name())?;

        let offset = block.offset(self.block_size);
        let file_size = file.metadata()?.len();
        if offset + self.block_size as u64 > file_size {
            return Err(StorageError::BlockNotFound(block.clone()));
        }

        let mut buf = vec![0u8; self.block_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        trace!("read {}", block);

        Ok(buf)
    }

    /// Write exactly one block of bytes at `block`, extending the file if needed.
    pub fn write_block(&self, block: &BlockId, data: &[u8]) -> StorageResult<()> {
        if data.len() != self.block_size {
            return Err(StorageError::BlockSizeMismatch {
                expected: self.block_size,
                actual: data.len(),
            });
        }

        let mut open_files = self.open_files.lock();
        let file = self.file_for(&mut open_files, block.file_name())?;

        file.seek(SeekFrom::Start(block.offset(self.block_size)))?;
        file.write_all(data)?;
        file.sync_all()?;
        trace!("wrote {}", block);

        Ok(())
    }

    /// Append one zero-filled block to `file_name` and return its id.
    pub fn append_empty_block(&self, file_name: &str) -> StorageResult<BlockId> {
        let block = BlockId::new(file_name, self.block_count(file_name)?);
        self.write_block(&block, &vec![0u8; self.block_size])?;
        Ok(block)
    }

    /// Number of whole blocks currently in `file_name`.
    pub fn block_count(&self, file_name: &str) -> StorageResult<u64> {
        let mut open_files = self.open_files.lock();
        let file = self.file_for(&mut open_files, file_name)?;
        Ok(file.metadata()?.len() / self.block_size as u64)
    }

    /// Read `block` and decode it into `page`.
    pub fn read_into<P: Page>(&self, block: &BlockId, page: &mut P) -> StorageResult<()> {
        let bytes = self.read_block(block)?;
        page.decode_from(bytes)
    }

    /// Serialize the page directory and write the page to `block`.
    pub fn write_page<P: Page>(&self, block: &BlockId, page: &mut P) -> StorageResult<()> {
        page.finish();
        self.write_block(block, page.content())
    }

    fn file_for<'a>(
        &self,
        open_files: &'a mut HashMap<String, File>,
        file_name: &str,
    ) -> StorageResult<&'a mut File> {
        match open_files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.db_directory.join(file_name))?;
                Ok(entry.insert(file))
            }
        }
    }
}
