//! Self-describing page of typed fields.
//!
//! Fields are appended in order and read back by index. Each field's type
//! tag is kept in the tail directory, so a page decoded from raw bytes still
//! refuses to interpret a field as the wrong type.

use crate::storage::codec;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::directory::{Directory, TailPage};
use crate::storage::page::{Page, TypeTag};

/// A value that can be written into a [`TypedPage`].
pub trait Field {
    const TYPE_TAG: TypeTag;

    fn encoded_len(&self) -> usize;

    /// Encode at `offset`, returning the number of bytes written.
    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize>;
}

/// A value that can be read out of a [`TypedPage`], possibly borrowing from it.
pub trait ReadField<'a>: Sized {
    const TYPE_TAG: TypeTag;

    fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self>;
}

macro_rules! integer_field {
    ($ty:ty, $tag:expr, $size:expr, $encode:path, $decode:path) => {
        impl Field for $ty {
            const TYPE_TAG: TypeTag = $tag;

            fn encoded_len(&self) -> usize {
                $size
            }

            fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
                Ok($encode(*self, dst, offset))
            }
        }

        impl<'a> ReadField<'a> for $ty {
            const TYPE_TAG: TypeTag = $tag;

            fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self> {
                Ok($decode(src, offset).0)
            }
        }
    };
}

integer_field!(u8, TypeTag::UInt8, codec::U8_SIZE, codec::encode_u8, codec::decode_u8);
integer_field!(u16, TypeTag::UInt16, codec::U16_SIZE, codec::encode_u16, codec::decode_u16);
integer_field!(u32, TypeTag::UInt32, codec::U32_SIZE, codec::encode_u32, codec::decode_u32);
integer_field!(u64, TypeTag::UInt64, codec::U64_SIZE, codec::encode_u64, codec::decode_u64);

impl Field for &str {
    const TYPE_TAG: TypeTag = TypeTag::String;

    fn encoded_len(&self) -> usize {
        codec::bytes_needed_for_sequence(self.len())
    }

    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
        codec::encode_byte_sequence(self.as_bytes(), dst, offset)
    }
}

impl Field for String {
    const TYPE_TAG: TypeTag = TypeTag::String;

    fn encoded_len(&self) -> usize {
        self.as_str().encoded_len()
    }

    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
        self.as_str().encode(dst, offset)
    }
}

impl Field for &[u8] {
    const TYPE_TAG: TypeTag = TypeTag::ByteSlice;

    fn encoded_len(&self) -> usize {
        codec::bytes_needed_for_sequence(self.len())
    }

    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
        codec::encode_byte_sequence(self, dst, offset)
    }
}

impl<const N: usize> Field for &[u8; N] {
    const TYPE_TAG: TypeTag = TypeTag::ByteSlice;

    fn encoded_len(&self) -> usize {
        codec::bytes_needed_for_sequence(N)
    }

    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
        codec::encode_byte_sequence(self.as_slice(), dst, offset)
    }
}

impl Field for Vec<u8> {
    const TYPE_TAG: TypeTag = TypeTag::ByteSlice;

    fn encoded_len(&self) -> usize {
        codec::bytes_needed_for_sequence(self.len())
    }

    fn encode(&self, dst: &mut [u8], offset: usize) -> StorageResult<usize> {
        codec::encode_byte_sequence(self, dst, offset)
    }
}

impl<'a> ReadField<'a> for &'a str {
    const TYPE_TAG: TypeTag = TypeTag::String;

    fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self> {
        let (bytes, _) = codec::decode_byte_sequence(src, offset);
        Ok(std::str::from_utf8(bytes)?)
    }
}

impl<'a> ReadField<'a> for String {
    const TYPE_TAG: TypeTag = TypeTag::String;

    fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self> {
        <&str>::decode(src, offset).map(str::to_string)
    }
}

impl<'a> ReadField<'a> for &'a [u8] {
    const TYPE_TAG: TypeTag = TypeTag::ByteSlice;

    fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self> {
        Ok(codec::decode_byte_sequence(src, offset).0)
    }
}

impl<'a> ReadField<'a> for Vec<u8> {
    const TYPE_TAG: TypeTag = TypeTag::ByteSlice;

    fn decode(src: &'a [u8], offset: usize) -> StorageResult<Self> {
        Ok(codec::decode_byte_sequence(src, offset).0.to_vec())
    }
}

/// Fixed-size page of typed fields with a tail directory of offsets and tags.
#[derive(Debug, Clone)]
pub struct TypedPage {
    inner: TailPage<TypeTag>,
}

impl TypedPage {
    pub fn new(block_size: usize) -> Self {
        Self {
            inner: TailPage::new(block_size),
        }
    }

    /// Reconstruct a page from the bytes of a finished block.
    pub fn from_bytes(bytes: Vec<u8>) -> StorageResult<Self> {
        Ok(Self {
            inner: TailPage::from_bytes(bytes)?,
        })
    }

    /// Number of fields on the page.
    pub fn len(&self) -> usize {
        self.inner.directory().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.directory().is_empty()
    }

    pub fn type_at(&self, index: usize) -> Option<TypeTag> {
        self.inner.directory().tag_at(index)
    }

    /// Bytes still available for field payloads and their directory entries.
    pub fn free_space(&self) -> usize {
        self.inner.free_bytes()
    }

    /// Append `value` as the next field and return its index.
    ///
    /// Fails with [`StorageError::PageFull`] without touching the page when
    /// the field and its directory entry would not fit.
    pub fn append<F: Field>(&mut self, value: F) -> StorageResult<usize> {
        self.inner
            .push(F::TYPE_TAG, value.encoded_len(), |buf, offset| {
                value.encode(buf, offset)
            })
    }

    /// Read field `index` as `T`.
    pub fn get<'a, T: ReadField<'a>>(&'a self, index: usize) -> StorageResult<T> {
        let offset = self.checked_offset(index, T::TYPE_TAG)?;
        T::decode(self.inner.content(), offset)
    }

    /// Overwrite field `index` in place with a value of the same type.
    ///
    /// The new encoding must fit in the span the field already occupies;
    /// otherwise [`StorageError::FieldOverflow`] is returned and the page is
    /// unchanged.
    pub fn mutate<F: Field>(&mut self, index: usize, value: F) -> StorageResult<()> {
        self.checked_offset(index, F::TYPE_TAG)?;
        let (start, end) = self
            .inner
            .entry_span(index)
            .ok_or(StorageError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?;

        let required = value.encoded_len();
        let reserved = end - start;
        if required > reserved {
            return Err(StorageError::FieldOverflow {
                index,
                required,
                reserved,
            });
        }

        let written = value.encode(self.inner.buffer_mut(), start)?;
        if index + 1 == self.len() {
            self.inner.set_write_offset(start + written);
        }
        Ok(())
    }

    fn checked_offset(&self, index: usize, expected: TypeTag) -> StorageResult<usize> {
        let directory = self.inner.directory();
        let (offset, actual) = match (directory.offset_at(index), directory.tag_at(index)) {
            (Some(offset), Some(tag)) => (offset, tag),
            _ => {
                return Err(StorageError::IndexOutOfBounds {
                    index,
                    len: directory.len(),
                })
            }
        };

        if actual != expected {
            return Err(StorageError::TypeMismatch {
                index,
                expected,
                actual,
            });
        }
        Ok(offset)
    }

    /// Bytes a directory of `fields` entries occupies at the tail.
    pub fn directory_size_for(fields: usize) -> usize {
        Directory::<TypeTag>::encoded_size_for(fields)
    }
}

impl Page for TypedPage {
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

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const BLOCK_SIZE: usize = 4096;
    const PEBBLE: &str = "PebbleDB is an LSM-based key/value storage engine";

    fn sample_page() -> Result<TypedPage> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(PEBBLE)?;
        page.append(32u32)?;
        page.append(16u16)?;
        page.append(64u64)?;
        page.finish();
        Ok(page)
    }

    #[test]
    fn test_append_and_get() -> Result<()> {
        let page = sample_page()?;

        assert_eq!(page.len(), 4);
        assert_eq!(page.get::<&str>(0)?, PEBBLE);
        assert_eq!(page.get::<u32>(1)?, 32);
        assert_eq!(page.get::<u16>(2)?, 16);
        assert_eq!(page.get::<u64>(3)?, 64);

        Ok(())
    }

    #[test]
    fn test_append_returns_index() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        assert_eq!(page.append(1u8)?, 0);
        assert_eq!(page.append(b"raw")?, 1);
        assert_eq!(page.append(String::from("owned"))?, 2);
        assert_eq!(page.type_at(1), Some(TypeTag::ByteSlice));
        assert_eq!(page.type_at(2), Some(TypeTag::String));
        assert_eq!(page.type_at(3), None);
        Ok(())
    }

    #[test]
    fn test_get_before_finish() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(7u8)?;
        page.append(vec![1u8, 2, 3])?;

        assert_eq!(page.get::<u8>(0)?, 7);
        assert_eq!(page.get::<&[u8]>(1)?, &[1, 2, 3]);
        assert_eq!(page.get::<Vec<u8>>(1)?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_decode_then_get() -> Result<()> {
        let page = sample_page()?;
        let decoded = TypedPage::from_bytes(page.content().to_vec())?;

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded.get::<String>(0)?, PEBBLE);
        assert_eq!(decoded.get::<u32>(1)?, 32);
        assert_eq!(decoded.get::<u16>(2)?, 16);
        assert_eq!(decoded.get::<u64>(3)?, 64);

        Ok(())
    }

    #[test]
    fn test_decode_then_extend() -> Result<()> {
        let page = sample_page()?;
        let mut decoded = TypedPage::from_bytes(page.content().to_vec())?;

        decoded.append("BoltDB is a B+Tree storage engine")?;
        decoded.finish();
        let reloaded = TypedPage::from_bytes(decoded.content().to_vec())?;

        assert_eq!(reloaded.len(), 5);
        assert_eq!(reloaded.get::<&str>(0)?, PEBBLE);
        assert_eq!(reloaded.get::<u32>(1)?, 32);
        assert_eq!(reloaded.get::<u16>(2)?, 16);
        assert_eq!(reloaded.get::<u64>(3)?, 64);
        assert_eq!(reloaded.get::<&str>(4)?, "BoltDB is a B+Tree storage engine");

        Ok(())
    }

    #[test]
    fn test_finish_is_idempotent() -> Result<()> {
        let mut page = sample_page()?;
        let first = page.content().to_vec();
        page.finish();
        assert_eq!(page.content(), first.as_slice());
        Ok(())
    }

    #[test]
    fn test_tail_layout() -> Result<()> {
        let mut page = TypedPage::new(32);
        page.append(0x0102u16)?;
        page.append(9u8)?;
        page.finish();

        let content = page.content();
        assert_eq!(&content[..3], &[0x02, 0x01, 9]);
        // offsets [0, 2], tags [UInt16, UInt8], count 2
        assert_eq!(&content[24..], &[0, 0, 2, 0, 2, 1, 2, 0]);
        Ok(())
    }

    #[test]
    fn test_empty_block_decodes_to_empty_page() -> Result<()> {
        let mut page = TypedPage::from_bytes(vec![0u8; 128])?;
        assert!(page.is_empty());
        page.append(5u32)?;
        assert_eq!(page.get::<u32>(0)?, 5);
        Ok(())
    }

    #[test]
    fn test_mutate_in_place() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(16u16)?;
        page.mutate(0, 20u16)?;
        assert_eq!(page.get::<u16>(0)?, 20);
        Ok(())
    }

    #[test]
    fn test_mutate_every_type() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(8u8)?;
        page.append(16u16)?;
        page.append(32u32)?;
        page.append(64u64)?;
        page.append(b"bytes")?;
        page.append("a string")?;
        page.append(1u8)?;

        page.mutate(0, 9u8)?;
        page.mutate(1, 17u16)?;
        page.mutate(2, 33u32)?;
        page.mutate(3, 65u64)?;
        page.mutate(4, b"BYTES")?;
        page.mutate(5, "short")?;
        page.finish();

        let page = TypedPage::from_bytes(page.content().to_vec())?;
        assert_eq!(page.get::<u8>(0)?, 9);
        assert_eq!(page.get::<u16>(1)?, 17);
        assert_eq!(page.get::<u32>(2)?, 33);
        assert_eq!(page.get::<u64>(3)?, 65);
        assert_eq!(page.get::<&[u8]>(4)?, b"BYTES");
        assert_eq!(page.get::<&str>(5)?, "short");
        assert_eq!(page.get::<u8>(6)?, 1);
        Ok(())
    }

    #[test]
    fn test_mutate_larger_value_fails_closed() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append("tiny")?;
        page.append(42u32)?;

        let result = page.mutate(0, "much longer than before");
        assert!(matches!(
            result,
            Err(StorageError::FieldOverflow {
                index: 0,
                required: 25,
                reserved: 6
            })
        ));
        assert_eq!(page.get::<&str>(0)?, "tiny");
        assert_eq!(page.get::<u32>(1)?, 42);
        Ok(())
    }

    #[test]
    fn test_mutate_shrinking_last_field() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(1u8)?;
        page.append("a longer string")?;
        page.mutate(1, "short")?;
        page.append(2u8)?;
        page.finish();

        let page = TypedPage::from_bytes(page.content().to_vec())?;
        assert_eq!(page.get::<&str>(1)?, "short");
        assert_eq!(page.get::<u8>(2)?, 2);
        Ok(())
    }

    #[test]
    fn test_mutate_type_mismatch() -> Result<()> {
        let mut page = TypedPage::new(BLOCK_SIZE);
        page.append(16u16)?;
        assert!(matches!(
            page.mutate(0, 16u32),
            Err(StorageError::TypeMismatch { index: 0, .. })
        ));
        assert!(matches!(
            page.mutate(1, 16u16),
            Err(StorageError::IndexOutOfBounds { index: 1, len: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_get_out_of_bounds_after_decode() -> Result<()> {
        let page = TypedPage::from_bytes(sample_page()?.content().to_vec())?;
        assert!(matches!(
            page.get::<u32>(4),
            Err(StorageError::IndexOutOfBounds { index: 4, len: 4 })
        ));
        Ok(())
    }

    #[test]
    fn test_get_type_mismatch_after_decode() -> Result<()> {
        let page = TypedPage::from_bytes(sample_page()?.content().to_vec())?;
        match page.get::<u64>(1) {
            Err(StorageError::TypeMismatch {
                index,
                expected,
                actual,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, TypeTag::UInt64);
                assert_eq!(actual, TypeTag::UInt32);
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
        // strings and byte slices are distinct types
        assert!(matches!(
            page.get::<&[u8]>(0),
            Err(StorageError::TypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_append_past_capacity() -> Result<()> {
        let mut page = TypedPage::new(17);
        // 17 - 2 count bytes = 15 free; a u64 needs 8 + 3 directory bytes
        page.append(1u64)?;
        assert_eq!(page.free_space(), 17 - 8 - TypedPage::directory_size_for(1));

        let result = page.append(2u64);
        assert!(matches!(
            result,
            Err(StorageError::PageFull {
                required: 11,
                available: 4
            })
        ));
        assert_eq!(page.len(), 1);

        page.append(3u8)?;
        page.finish();
        let page = TypedPage::from_bytes(page.content().to_vec())?;
        assert_eq!(page.get::<u64>(0)?, 1);
        assert_eq!(page.get::<u8>(1)?, 3);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_string() -> Result<()> {
        let mut page = TypedPage::new(64);
        page.append("ab")?;
        page.finish();

        let mut bytes = page.content().to_vec();
        bytes[2] = 0xff;
        let page = TypedPage::from_bytes(bytes)?;
        assert!(matches!(
            page.get::<&str>(0),
            Err(StorageError::InvalidUtf8(_))
        ));
        Ok(())
    }
}
