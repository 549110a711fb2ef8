//! Per-encoding codec implementations.
//!
//! Each submodule pairs a stateful encoder (values in, payload out on flush)
//! with a pull-based decoder (payload in, one value per `next`). The public
//! [`Encoder`](crate::Encoder) and [`Decoder`](crate::Decoder) wrap them and
//! dispatch on the encoding tag.

use bytes::{Buf, Bytes};

use crate::error::{CodecError, Result};
use crate::types::{DataType, Encoding, Value};

pub mod gorilla;
pub mod plain;
pub mod rle;
pub mod ts2diff;

pub(crate) trait ValueEncoder {
    /// Appends one value. The caller has already checked its type.
    fn encode(&mut self, value: &Value) -> Result<()>;

    /// Finalizes the payload and clears running state.
    fn flush(&mut self) -> Result<Bytes>;

    fn reset(&mut self);
}

pub(crate) trait ValueDecoder {
    fn has_next<B: Buf>(&self, buf: &B) -> bool;

    fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value>;

    fn reset(&mut self);
}

/// Bit pattern of a fixed-width value.
#[inline]
pub(crate) fn bits_of(expected: DataType, value: &Value) -> Result<u64> {
    value.raw_bits().ok_or(CodecError::TypeMismatch {
        expected,
        found: value.data_type(),
    })
}

/// Rebuilds a fixed-width value from its bit pattern.
#[inline]
pub(crate) fn value_of(data_type: DataType, encoding: Encoding, bits: u64) -> Result<Value> {
    Value::from_raw_bits(data_type, bits).ok_or(CodecError::UnsupportedTypeEncoding {
        data_type,
        encoding,
    })
}

/// Width of the data type's bit pattern, failing for variable-length types.
pub(crate) fn fixed_width(data_type: DataType, encoding: Encoding) -> Result<u8> {
    data_type
        .bit_width()
        .ok_or(CodecError::UnsupportedTypeEncoding {
            data_type,
            encoding,
        })
}

/// Fails with `BufferUnderflow` unless `n` more bytes are readable.
#[inline]
pub(crate) fn ensure<B: Buf>(buf: &B, n: usize) -> Result<()> {
    if buf.remaining() < n {
        Err(CodecError::BufferUnderflow)
    } else {
        Ok(())
    }
}

/// Mask with the lowest `n` bits set. Handles `n == 64` without overflow.
#[inline]
pub(crate) fn bitmask(n: u8) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Interprets the low `width` bits of `bits` as a two's-complement number.
/// One-bit values (booleans) are treated as unsigned.
#[inline]
pub(crate) fn sign_extend(bits: u64, width: u8) -> i64 {
    if width <= 1 || width >= 64 {
        return bits as i64;
    }
    let shift = 64 - width;
    ((bits << shift) as i64) >> shift
}

/// Number of bits needed to represent `value`.
#[inline]
pub(crate) fn bits_required(value: u64) -> u8 {
    (64 - value.leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
        assert_eq!(sign_extend(0x7FFF_FFFF, 32), i32::MAX as i64);
        assert_eq!(sign_extend(1, 1), 1);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(0), 0);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(bits_required(u64::MAX), 64);
    }

    #[test]
    fn test_bitmask() {
        assert_eq!(bitmask(0), 0);
        assert_eq!(bitmask(5), 0b11111);
        assert_eq!(bitmask(64), u64::MAX);
    }
}
