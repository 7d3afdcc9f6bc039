//! Binary codec for page contents.
//!
//! Every integer is little-endian and occupies exactly its width. Byte
//! sequences (raw bytes and strings alike) are written as a 16-bit length
//! prefix followed by the payload. Encoders return the number of bytes they
//! wrote; decoders return the value together with the offset immediately
//! following it, so callers can chain field positions.
//!
//! Out-of-bounds access against the buffer panics; nothing is ever silently
//! truncated.

use byteorder::{ByteOrder, LittleEndian};

use crate::storage::error::{StorageError, StorageResult};

pub const U8_SIZE: usize = 1;
pub const U16_SIZE: usize = 2;
pub const U32_SIZE: usize = 4;
pub const U64_SIZE: usize = 8;

/// Size of the length prefix in front of every byte sequence.
pub const SEQUENCE_LENGTH_PREFIX: usize = U16_SIZE;

/// Longest byte sequence the length prefix can describe.
pub const MAX_SEQUENCE_LEN: usize = u16::MAX as usize;

/// Bytes occupied by an encoded sequence with a payload of `len` bytes.
pub fn bytes_needed_for_sequence(len: usize) -> usize {
    SEQUENCE_LENGTH_PREFIX + len
}

pub fn encode_u8(value: u8, dst: &mut [u8], offset: usize) -> usize {
    dst[offset] = value;
    U8_SIZE
}

pub fn decode_u8(src: &[u8], offset: usize) -> (u8, usize) {
    (src[offset], offset + U8_SIZE)
}

pub fn encode_u16(value: u16, dst: &mut [u8], offset: usize) -> usize {
    LittleEndian::write_u16(&mut dst[offset..offset + U16_SIZE], value);
    U16_SIZE
}

pub fn decode_u16(src: &[u8], offset: usize) -> (u16, usize) {
    let value = LittleEndian::read_u16(&src[offset..offset + U16_SIZE]);
    (value, offset + U16_SIZE)
}

pub fn encode_u32(value: u32, dst: &mut [u8], offset: usize) -> usize {
    LittleEndian::write_u32(&mut dst[offset..offset + U32_SIZE], value);
    U32_SIZE
}

pub fn decode_u32(src: &[u8], offset: usize) -> (u32, usize) {
    let value = LittleEndian::read_u32(&src[offset..offset + U32_SIZE]);
    (value, offset + U32_SIZE)
}

pub fn encode_u64(value: u64, dst: &mut [u8], offset: usize) -> usize {
    LittleEndian::write_u64(&mut dst[offset..offset + U64_SIZE], value);
    U64_SIZE
}

pub fn decode_u64(src: &[u8], offset: usize) -> (u64, usize) {
    let value = LittleEndian::read_u64(&src[offset..offset + U64_SIZE]);
    (value, offset + U64_SIZE)
}

/// Write `source` as a length-prefixed sequence at `offset`.
///
/// Fails with [`StorageError::SequenceTooLong`] when the payload cannot be
/// described by the 16-bit prefix.
pub fn encode_byte_sequence(source: &[u8], dst: &mut [u8], offset: usize) -> StorageResult<usize> {
    if source.len() > MAX_SEQUENCE_LEN {
        return Err(StorageError::SequenceTooLong { len: source.len() });
    }

    let payload_start = offset + SEQUENCE_LENGTH_PREFIX;
    let payload_end = payload_start + source.len();
    let payload = &mut dst[payload_start..payload_end];
    payload.copy_from_slice(source);
    encode_u16(source.len() as u16, dst, offset);

    Ok(bytes_needed_for_sequence(source.len()))
}

pub fn decode_byte_sequence(src: &[u8], offset: usize) -> (&[u8], usize) {
    let (len, payload_start) = decode_u16(src, offset);
    let end = payload_start + len as usize;
    (&src[payload_start..end], end)
}
