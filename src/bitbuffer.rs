use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Returns a mask with the lowest `n` bits set (`n <= 8`).
#[inline]
fn mask8(n: u8) -> u8 {
    ((1u16 << n) - 1) as u8
}

/// A growable bit sink that packs bits MSB-first into bytes.
///
/// Completed bytes are appended to an internal `BytesMut`; the byte being
/// filled is held separately until it is full or the writer is aligned.
#[derive(Debug, Clone)]
pub struct BitWriter {
    bytes: BytesMut,
    /// Byte currently being filled, high bits first.
    buffer: u8,
    /// Number of free bits remaining in `buffer` (1..=8).
    bits_left: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a `BitWriter` with the given pre-allocated capacity in bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            buffer: 0,
            bits_left: 8,
        }
    }

    /// Returns the total number of bits written.
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.bytes.len() * 8 + (8 - self.bits_left) as usize
    }

    /// Returns `true` if no bits have been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len_bits() == 0
    }

    /// Returns `true` if the next write starts on a byte boundary.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.bits_left == 8
    }

    /// Writes a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.buffer |= 1 << (self.bits_left - 1);
        }
        self.bits_left -= 1;
        self.flip_byte();
    }

    /// Writes the lowest `n` bits of `value`, most significant first. `n` must be <= 64.
    pub fn write_bits(&mut self, value: u64, n: u8) {
        debug_assert!(n <= 64);
        let mut remaining = n;
        while remaining > 0 {
            if remaining >= self.bits_left {
                let shift = remaining - self.bits_left;
                self.buffer |= (value >> shift) as u8 & mask8(self.bits_left);
                remaining -= self.bits_left;
                self.bits_left = 0;
            } else {
                let shift = self.bits_left - remaining;
                self.buffer |= (value as u8 & mask8(remaining)) << shift;
                self.bits_left -= remaining;
                remaining = 0;
            }
            self.flip_byte();
        }
    }

    /// Pads the partial byte, if any, with zero bits and emits it.
    pub fn align(&mut self) {
        if !self.is_aligned() {
            self.bits_left = 0;
            self.flip_byte();
        }
    }

    /// Aligns and returns everything written so far, leaving the writer empty.
    pub fn finish(&mut self) -> Bytes {
        self.align();
        self.bytes.split().freeze()
    }

    /// Like [`BitWriter::finish`], but always emits one more byte: the padded
    /// partial byte, or an empty byte when already aligned. Readers using
    /// [`Refill::Eager`] pull that byte right after the last bit.
    pub fn finish_with_terminator(&mut self) -> Bytes {
        self.bits_left = 0;
        self.flip_byte();
        self.bytes.split().freeze()
    }

    /// Drops all written bits.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.buffer = 0;
        self.bits_left = 8;
    }

    #[inline]
    fn flip_byte(&mut self) {
        if self.bits_left == 0 {
            self.bytes.put_u8(self.buffer);
            self.buffer = 0;
            self.bits_left = 8;
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// When a [`BitReader`] pulls the next byte from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refill {
    /// Pull a byte only when a bit is requested and none is buffered.
    Lazy,
    /// Pull the next byte as soon as the buffered byte is used up. The stream
    /// must end with a terminator byte (see [`BitWriter::finish_with_terminator`]).
    Eager,
}

/// A cursor for reading bits MSB-first from any [`Buf`].
///
/// The reader only owns the partially consumed byte; the source is passed to
/// every call, so one reader state can be threaded through a pull-based decoder.
#[derive(Debug, Clone)]
pub struct BitReader {
    buffer: u8,
    /// Unread bits in `buffer` (0..=8).
    bits_left: u8,
    refill: Refill,
}

impl BitReader {
    pub fn new(refill: Refill) -> Self {
        Self {
            buffer: 0,
            bits_left: 0,
            refill,
        }
    }

    /// Number of unread bits still buffered.
    #[inline]
    pub fn bits_left(&self) -> u8 {
        self.bits_left
    }

    /// Returns `true` if a bit is buffered or `buf` still has bytes.
    #[inline]
    pub fn has_remaining<B: Buf>(&self, buf: &B) -> bool {
        self.bits_left > 0 || buf.has_remaining()
    }

    /// Reads a single bit.
    #[inline]
    pub fn read_bit<B: Buf>(&mut self, buf: &mut B) -> Result<bool> {
        self.flip_byte(buf)?;
        let bit = (self.buffer >> (self.bits_left - 1)) & 1 == 1;
        self.bits_left -= 1;
        if self.refill == Refill::Eager {
            self.flip_byte(buf)?;
        }
        Ok(bit)
    }

    /// Reads `n` bits as a `u64` (most significant first). `n` must be <= 64.
    pub fn read_bits<B: Buf>(&mut self, n: u8, buf: &mut B) -> Result<u64> {
        debug_assert!(n <= 64);
        let mut value: u64 = 0;
        let mut remaining = n;
        while remaining > 0 {
            self.flip_byte(buf)?;
            let take = remaining.min(self.bits_left);
            let chunk = (self.buffer >> (self.bits_left - take)) & mask8(take);
            value = (value << take) | chunk as u64;
            self.bits_left -= take;
            remaining -= take;
            if self.refill == Refill::Eager {
                self.flip_byte(buf)?;
            }
        }
        Ok(value)
    }

    /// Reads up to `max_bits` bits, stopping after the first `0`. The bits read
    /// are returned as a number, so with `max_bits == 2` the result is
    /// `0b0`, `0b10` or `0b11`.
    pub fn read_next_clear_bit<B: Buf>(&mut self, max_bits: u8, buf: &mut B) -> Result<u8> {
        let mut value = 0u8;
        for _ in 0..max_bits {
            value <<= 1;
            if self.read_bit(buf)? {
                value |= 1;
            } else {
                break;
            }
        }
        Ok(value)
    }

    /// Discards the unread bits of the current byte.
    #[inline]
    pub fn align(&mut self) {
        self.bits_left = 0;
    }

    pub fn reset(&mut self) {
        self.buffer = 0;
        self.bits_left = 0;
    }

    #[inline]
    fn flip_byte<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        if self.bits_left == 0 {
            if !buf.has_remaining() {
                return Err(CodecError::BufferUnderflow);
            }
            self.buffer = buf.get_u8();
            self.bits_left = 8;
        }
        Ok(())
    }
}
