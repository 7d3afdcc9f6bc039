use std::fmt;

use crate::storage::codec;
use crate::storage::error::StorageError;

/// Type of a field stored in a [`TypedPage`](super::TypedPage).
///
/// The numeric codes are persisted in the page directory and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    UInt8 = 1,
    UInt16 = 2,
    UInt32 = 3,
    UInt64 = 4,
    String = 5,
    ByteSlice = 6,
}

impl TypeTag {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::UInt8 => "uint8",
            TypeTag::UInt16 => "uint16",
            TypeTag::UInt32 => "uint32",
            TypeTag::UInt64 => "uint64",
            TypeTag::String => "string",
            TypeTag::ByteSlice => "bytes",
        }
    }

    /// Offset just past a value of this type encoded at `offset`.
    pub fn end_offset_after_decode(self, src: &[u8], offset: usize) -> usize {
        match self {
            TypeTag::UInt8 => codec::decode_u8(src, offset).1,
            TypeTag::UInt16 => codec::decode_u16(src, offset).1,
            TypeTag::UInt32 => codec::decode_u32(src, offset).1,
            TypeTag::UInt64 => codec::decode_u64(src, offset).1,
            TypeTag::String | TypeTag::ByteSlice => codec::decode_byte_sequence(src, offset).1,
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = StorageError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TypeTag::UInt8),
            2 => Ok(TypeTag::UInt16),
            3 => Ok(TypeTag::UInt32),
            4 => Ok(TypeTag::UInt64),
            5 => Ok(TypeTag::String),
            6 => Ok(TypeTag::ByteSlice),
            other => Err(StorageError::UnknownTypeTag(other)),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
