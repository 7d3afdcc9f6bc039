//! Tail directory shared by typed pages and log pages.
//!
//! A page packs its entries from offset 0 forward and describes them with a
//! directory serialized at the end of the block:
//!
//! ```text
//! [ entry_0 ][ entry_1 ] ... [ entry_N-1 ]   (free space)
//! [ offsets: N x u16 LE ][ tags: N x T ][ count: u16 LE ]
//! ```
//!
//! Typed pages carry a one-byte [`TypeTag`] per entry; log pages carry no tag
//! (`T = ()`), so their tags array is empty.

use std::fmt::Debug;

use crate::storage::codec::{self, U16_SIZE};
use crate::storage::disk::MAX_BLOCK_SIZE;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::TypeTag;

/// Size of one starting offset in the directory.
pub const OFFSET_SIZE: usize = U16_SIZE;

/// Size of the entry count in the last bytes of the block.
pub const COUNT_SIZE: usize = U16_SIZE;

/// Starting offset of every entry, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartingOffsets {
    offsets: Vec<u16>,
}

impl StartingOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a packed array of little-endian u16 offsets.
    pub fn decode_from(buf: &[u8]) -> Self {
        let offsets = buf
            .chunks_exact(OFFSET_SIZE)
            .map(|chunk| codec::decode_u16(chunk, 0).0)
            .collect();
        Self { offsets }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size_in_bytes()];
        for (index, &offset) in self.offsets.iter().enumerate() {
            codec::encode_u16(offset, &mut buf, index * OFFSET_SIZE);
        }
        buf
    }

    pub fn push(&mut self, offset: u16) {
        self.offsets.push(offset);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offset_at(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).map(|&offset| offset as usize)
    }

    pub fn size_in_bytes(&self) -> usize {
        OFFSET_SIZE * self.offsets.len()
    }
}

/// Per-entry tag stored alongside each starting offset.
pub trait EntryTag: Copy + Debug {
    /// Bytes one tag occupies in the directory.
    const ENCODED_SIZE: usize;

    fn encode(self, dst: &mut [u8], offset: usize);

    fn decode(src: &[u8], offset: usize) -> StorageResult<Self>;

    /// Offset just past the entry that starts at `start`.
    fn end_offset(self, src: &[u8], start: usize) -> usize;
}

/// Log records are opaque length-prefixed byte sequences.
impl EntryTag for () {
    const ENCODED_SIZE: usize = 0;

    fn encode(self, _dst: &mut [u8], _offset: usize) {}

    fn decode(_src: &[u8], _offset: usize) -> StorageResult<Self> {
        Ok(())
    }

    fn end_offset(self, src: &[u8], start: usize) -> usize {
        codec::decode_byte_sequence(src, start).1
    }
}

impl EntryTag for TypeTag {
    const ENCODED_SIZE: usize = 1;

    fn encode(self, dst: &mut [u8], offset: usize) {
        codec::encode_u8(self.code(), dst, offset);
    }

    fn decode(src: &[u8], offset: usize) -> StorageResult<Self> {
        TypeTag::try_from(codec::decode_u8(src, offset).0)
    }

    fn end_offset(self, src: &[u8], start: usize) -> usize {
        self.end_offset_after_decode(src, start)
    }
}

/// Ordered starting offsets plus one tag per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory<T> {
    offsets: StartingOffsets,
    tags: Vec<T>,
}

impl<T: EntryTag> Default for Directory<T> {
    fn default() -> Self {
        Self {
            offsets: StartingOffsets::new(),
            tags: Vec::new(),
        }
    }
}

impl<T: EntryTag> Directory<T> {
    /// Directory bytes consumed by one entry.
    pub const ENTRY_SIZE: usize = OFFSET_SIZE + T::ENCODED_SIZE;

    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized size of a directory holding `entries` entries.
    pub fn encoded_size_for(entries: usize) -> usize {
        entries * Self::ENTRY_SIZE + COUNT_SIZE
    }

    pub fn encoded_size(&self) -> usize {
        Self::encoded_size_for(self.len())
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn push(&mut self, offset: u16, tag: T) {
        self.offsets.push(offset);
        self.tags.push(tag);
    }

    pub fn offset_at(&self, index: usize) -> Option<usize> {
        self.offsets.offset_at(index)
    }

    pub fn tag_at(&self, index: usize) -> Option<T> {
        self.tags.get(index).copied()
    }

    pub fn starting_offsets(&self) -> &StartingOffsets {
        &self.offsets
    }

    /// Serialize into the last [`encoded_size`](Self::encoded_size) bytes of `buf`.
    pub fn write_to_tail(&self, buf: &mut [u8]) {
        let count = self.len();
        let count_start = buf.len() - COUNT_SIZE;
        let tags_start = count_start - count * T::ENCODED_SIZE;
        let offsets_start = tags_start - self.offsets.size_in_bytes();

        buf[offsets_start..tags_start].copy_from_slice(&self.offsets.encode());
        for (index, tag) in self.tags.iter().enumerate() {
            tag.encode(buf, tags_start + index * T::ENCODED_SIZE);
        }
        codec::encode_u16(count as u16, buf, count_start);
    }

    /// Rebuild a directory by walking backward from the end of `buf`.
    pub fn read_from_tail(buf: &[u8]) -> StorageResult<Self> {
        if buf.len() < COUNT_SIZE {
            return Err(StorageError::CorruptedPage(format!(
                "block of {} bytes cannot hold an entry count",
                buf.len()
            )));
        }

        let count_start = buf.len() - COUNT_SIZE;
        let count = codec::decode_u16(buf, count_start).0 as usize;
        let directory_size = Self::encoded_size_for(count);
        if directory_size > buf.len() {
            return Err(StorageError::CorruptedPage(format!(
                "directory of {} entries needs {} bytes, block has {}",
                count,
                directory_size,
                buf.len()
            )));
        }

        let tags_start = count_start - count * T::ENCODED_SIZE;
        let offsets_start = tags_start - count * OFFSET_SIZE;

        let offsets = StartingOffsets::decode_from(&buf[offsets_start..tags_start]);
        if let Some(bad) = offsets.offsets.iter().find(|&&o| o as usize >= offsets_start) {
            return Err(StorageError::CorruptedPage(format!(
                "entry offset {} overlaps the directory at {}",
                bad, offsets_start
            )));
        }

        let tags = (0..count)
            .map(|index| T::decode(buf, tags_start + index * T::ENCODED_SIZE))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Self { offsets, tags })
    }
}

/// A fixed-size block whose entries are described by a tail [`Directory`].
///
/// Holds the state common to [`TypedPage`](super::TypedPage) and
/// [`LogPage`](super::LogPage): the raw bytes, the directory and the write
/// cursor for the next entry.
#[derive(Debug, Clone)]
pub(crate) struct TailPage<T> {
    buffer: Vec<u8>,
    directory: Directory<T>,
    write_offset: usize,
}

impl<T: EntryTag> TailPage<T> {
    pub fn new(block_size: usize) -> Self {
        assert!(
            (COUNT_SIZE..=MAX_BLOCK_SIZE).contains(&block_size),
            "block size {} outside {}..={}",
            block_size,
            COUNT_SIZE,
            MAX_BLOCK_SIZE
        );
        Self {
            buffer: vec![0u8; block_size],
            directory: Directory::new(),
            write_offset: 0,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> StorageResult<Self> {
        let mut page = Self {
            buffer: Vec::new(),
            directory: Directory::new(),
            write_offset: 0,
        };
        page.decode_from(bytes)?;
        Ok(page)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn content(&self) -> &[u8] {
        &self.buffer
    }

    pub fn directory(&self) -> &Directory<T> {
        &self.directory
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Bytes left for entry payloads and their directory slots.
    pub fn free_bytes(&self) -> usize {
        self.capacity()
            .saturating_sub(self.write_offset + self.directory.encoded_size())
    }

    /// Whether an entry whose encoding takes `encoded_len` bytes still fits,
    /// counting the directory slot it will add.
    pub fn has_capacity_for(&self, encoded_len: usize) -> bool {
        encoded_len + Directory::<T>::ENTRY_SIZE <= self.free_bytes()
    }

    /// Encode a new entry at the write cursor and record it in the directory.
    /// On error the page is left untouched.
    pub fn push<F>(&mut self, tag: T, encoded_len: usize, encode: F) -> StorageResult<usize>
    where
        F: FnOnce(&mut [u8], usize) -> StorageResult<usize>,
    {
        if !self.has_capacity_for(encoded_len) {
            return Err(StorageError::PageFull {
                required: encoded_len + Directory::<T>::ENTRY_SIZE,
                available: self.free_bytes(),
            });
        }

        let start = self.write_offset;
        let written = encode(&mut self.buffer, start)?;
        self.directory.push(start as u16, tag);
        self.write_offset += written;

        Ok(self.directory.len() - 1)
    }

    /// Byte range reserved for entry `index`: up to the next entry's start,
    /// or the write cursor for the last entry.
    pub fn entry_span(&self, index: usize) -> Option<(usize, usize)> {
        let start = self.directory.offset_at(index)?;
        let end = self
            .directory
            .offset_at(index + 1)
            .unwrap_or(self.write_offset);
        Some((start, end))
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Pull the write cursor back after the last entry shrank in place.
    pub fn set_write_offset(&mut self, write_offset: usize) {
        self.write_offset = write_offset;
    }

    pub fn finish(&mut self) {
        self.directory.write_to_tail(&mut self.buffer);
    }

    /// Replace this page's state with the page serialized in `bytes`.
    pub fn decode_from(&mut self, bytes: Vec<u8>) -> StorageResult<()> {
        if bytes.len() > MAX_BLOCK_SIZE {
            return Err(StorageError::InvalidBlockSize(bytes.len()));
        }

        let directory = Directory::<T>::read_from_tail(&bytes)?;
        let write_offset = match directory.len().checked_sub(1) {
            Some(last) => {
                let start = directory.offset_at(last).unwrap_or(0);
                let tag = directory.tag_at(last).ok_or_else(|| {
                    StorageError::CorruptedPage("directory lost its last tag".to_string())
                })?;
                tag.end_offset(&bytes, start)
            }
            None => 0,
        };

        if write_offset + directory.encoded_size() > bytes.len() {
            return Err(StorageError::CorruptedPage(format!(
                "last entry ends at {} inside the directory",
                write_offset
            )));
        }

        self.buffer = bytes;
        self.directory = directory;
        self.write_offset = write_offset;
        Ok(())
    }
}
