//! LEB128 and zigzag helpers used by the byte-level parts of the formats.

use bytes::{Buf, BufMut};

use crate::error::{CodecError, Result};

/// Writes `value` as an unsigned LEB128 varint.
pub fn put_uvarint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Reads an unsigned LEB128 varint.
pub fn get_uvarint<B: Buf>(buf: &mut B) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..10 {
        if !buf.has_remaining() {
            return Err(CodecError::BufferUnderflow);
        }
        let byte = buf.get_u8();
        if i == 9 && byte > 1 {
            return Err(CodecError::MalformedHeader("varint overflows 64 bits".into()));
        }
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::MalformedHeader("varint longer than 10 bytes".into()))
}

/// Reads a varint that must fit a `u32`, such as a length field.
pub fn get_uvarint_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    let value = get_uvarint(buf)?;
    u32::try_from(value)
        .map_err(|_| CodecError::MalformedHeader(format!("length {value} exceeds u32")))
}

#[inline]
pub fn zigzag_encode_i32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

#[inline]
pub fn zigzag_decode_i32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

pub fn put_zigzag_i32<B: BufMut>(buf: &mut B, v: i32) {
    put_uvarint(buf, zigzag_encode_i32(v) as u64);
}

pub fn get_zigzag_i32<B: Buf>(buf: &mut B) -> Result<i32> {
    let raw = get_uvarint_u32(buf)?;
    Ok(zigzag_decode_i32(raw))
}
