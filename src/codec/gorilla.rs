//! Gorilla XOR compression, as described in *"Gorilla: A Fast, Scalable,
//! In-Memory Time Series Database"* (VLDB 2015), applied to the bit patterns
//! of 32- and 64-bit values.
//!
//! The first value is stored verbatim. Every later value is XORed with its
//! predecessor:
//!
//! | control | meaning                                                        |
//! |---------|----------------------------------------------------------------|
//! | `0`     | XOR is zero, value unchanged                                   |
//! | `10`    | meaningful bits fit the stored leading/trailing-zero window    |
//! | `11`    | new window: leading zeros, meaningful-bit count, then the bits |
//!
//! The leading-zero field is 5 bits for 32-bit types and 6 bits for 64-bit
//! types; the meaningful-bit count uses a field of the same width.
//!
//! Two layouts exist and both must stay readable:
//!
//! - **V1** (`GORILLA`): 4-byte big-endian value count, meaningful-bit count
//!   stored modulo the field size (a full-width count is written as `0`),
//!   bits pulled from the page one byte at a time on demand.
//! - **V2** (`GORILLA_V2`): LEB128 value count, meaningful-bit count stored
//!   minus one, and the reader refills eagerly as soon as a byte is used up,
//!   so the writer always closes the stream with one extra byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{bitmask, bits_of, ensure, fixed_width, value_of, ValueDecoder, ValueEncoder};
use crate::bitbuffer::{BitReader, BitWriter, Refill};
use crate::error::{CodecError, Result};
use crate::types::{DataType, Encoding, Value};
use crate::varint;

/// Leading-zero window before any window has been written.
const NO_WINDOW: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GorillaVersion {
    V1,
    V2,
}

impl GorillaVersion {
    pub fn encoding(self) -> Encoding {
        match self {
            GorillaVersion::V1 => Encoding::Gorilla,
            GorillaVersion::V2 => Encoding::GorillaV2,
        }
    }

    fn refill(self) -> Refill {
        match self {
            GorillaVersion::V1 => Refill::Lazy,
            GorillaVersion::V2 => Refill::Eager,
        }
    }

    fn encode_meaningful(self, meaningful: u8, field_bits: u8) -> u64 {
        match self {
            GorillaVersion::V1 => meaningful as u64 & bitmask(field_bits),
            GorillaVersion::V2 => (meaningful - 1) as u64,
        }
    }

    fn decode_meaningful(self, field: u64, value_bits: u8) -> u8 {
        match self {
            GorillaVersion::V1 if field == 0 => value_bits,
            GorillaVersion::V1 => field as u8,
            GorillaVersion::V2 => field as u8 + 1,
        }
    }
}

/// Field widths for one value width.
#[derive(Debug, Clone, Copy)]
struct Layout {
    value_bits: u8,
    leading_zero_bits: u8,
    meaningful_bits: u8,
}

impl Layout {
    fn for_type(data_type: DataType, encoding: Encoding) -> Result<Self> {
        match fixed_width(data_type, encoding)? {
            32 => Ok(Layout {
                value_bits: 32,
                leading_zero_bits: 5,
                meaningful_bits: 5,
            }),
            64 => Ok(Layout {
                value_bits: 64,
                leading_zero_bits: 6,
                meaningful_bits: 6,
            }),
            _ => Err(CodecError::UnsupportedTypeEncoding {
                data_type,
                encoding,
            }),
        }
    }
}

/// The Gorilla compressor (encoder).
#[derive(Debug)]
pub struct GorillaEncoder {
    version: GorillaVersion,
    data_type: DataType,
    layout: Layout,
    out: BitWriter,
    /// Number of values encoded since the last flush.
    count: u64,
    /// Previous value as raw bits.
    stored_value: u64,
    /// Leading zeros of the current window, `NO_WINDOW` until one is written.
    stored_leading_zeros: u8,
    /// Trailing zeros of the current window.
    stored_trailing_zeros: u8,
}

impl GorillaEncoder {
    pub fn new(data_type: DataType, version: GorillaVersion) -> Result<Self> {
        Ok(Self {
            version,
            data_type,
            layout: Layout::for_type(data_type, version.encoding())?,
            out: BitWriter::with_capacity(128),
            count: 0,
            stored_value: 0,
            stored_leading_zeros: NO_WINDOW,
            stored_trailing_zeros: 0,
        })
    }

    fn write_first(&mut self, bits: u64) {
        self.out.write_bits(bits, self.layout.value_bits);
    }

    /// XOR-based value compression:
    ///
    /// 1. XOR with the previous value.
    /// 2. If XOR == 0: write a single `0` bit.
    /// 3. Else write `1`, then either `0` + the meaningful bits inside the
    ///    stored window, or `1` + leading zeros + meaningful-bit count +
    ///    meaningful bits, which becomes the new window.
    fn compress_value(&mut self, bits: u64) {
        let xor = bits ^ self.stored_value;
        if xor == 0 {
            self.out.write_bit(false);
            return;
        }
        self.out.write_bit(true);

        let Layout {
            value_bits,
            leading_zero_bits,
            meaningful_bits,
        } = self.layout;
        let leading = (xor.leading_zeros() - (64 - value_bits as u32)) as u8;
        let trailing = xor.trailing_zeros() as u8;

        if leading >= self.stored_leading_zeros && trailing >= self.stored_trailing_zeros {
            self.out.write_bit(false);
            let meaningful = value_bits - self.stored_leading_zeros - self.stored_trailing_zeros;
            self.out
                .write_bits(xor >> self.stored_trailing_zeros, meaningful);
        } else {
            self.out.write_bit(true);
            let meaningful = value_bits - leading - trailing;
            self.out.write_bits(leading as u64, leading_zero_bits);
            self.out.write_bits(
                self.version.encode_meaningful(meaningful, meaningful_bits),
                meaningful_bits,
            );
            self.out.write_bits(xor >> trailing, meaningful);

            self.stored_leading_zeros = leading;
            self.stored_trailing_zeros = trailing;
        }
    }
}

impl ValueEncoder for GorillaEncoder {
    fn encode(&mut self, value: &Value) -> Result<()> {
        let bits = bits_of(self.data_type, value)?;
        if self.version == GorillaVersion::V1 && self.count >= u32::MAX as u64 {
            return Err(CodecError::ArithmeticOverflow(
                "GORILLA page holds more values than its 32-bit count".into(),
            ));
        }
        if self.count == 0 {
            self.write_first(bits);
        } else {
            self.compress_value(bits);
        }
        self.stored_value = bits;
        self.count += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<Bytes> {
        if self.count == 0 {
            return Ok(Bytes::new());
        }
        let body = match self.version {
            GorillaVersion::V1 => self.out.finish(),
            GorillaVersion::V2 => self.out.finish_with_terminator(),
        };
        let mut page = BytesMut::with_capacity(body.len() + 10);
        match self.version {
            GorillaVersion::V1 => page.put_u32(self.count as u32),
            GorillaVersion::V2 => varint::put_uvarint(&mut page, self.count),
        }
        page.put_slice(&body);
        self.reset();
        Ok(page.freeze())
    }

    fn reset(&mut self) {
        self.out.clear();
        self.count = 0;
        self.stored_value = 0;
        self.stored_leading_zeros = NO_WINDOW;
        self.stored_trailing_zeros = 0;
    }
}

/// The Gorilla decompressor (decoder).
#[derive(Debug)]
pub struct GorillaDecoder {
    version: GorillaVersion,
    data_type: DataType,
    layout: Layout,
    reader: BitReader,
    /// Values left in the page, `None` until the count header is read.
    remaining: Option<u64>,
    first_value_was_read: bool,
    stored_value: u64,
    stored_leading_zeros: u8,
    stored_trailing_zeros: u8,
}

impl GorillaDecoder {
    pub fn new(data_type: DataType, version: GorillaVersion) -> Result<Self> {
        Ok(Self {
            version,
            data_type,
            layout: Layout::for_type(data_type, version.encoding())?,
            reader: BitReader::new(version.refill()),
            remaining: None,
            first_value_was_read: false,
            stored_value: 0,
            stored_leading_zeros: NO_WINDOW,
            stored_trailing_zeros: 0,
        })
    }

    fn read_count<B: Buf>(&self, buf: &mut B) -> Result<u64> {
        let count = match self.version {
            GorillaVersion::V1 => {
                ensure(buf, 4)?;
                buf.get_u32() as u64
            }
            GorillaVersion::V2 => varint::get_uvarint(buf)?,
        };
        if count == 0 {
            return Err(CodecError::MalformedHeader(
                "Gorilla page declares zero values".into(),
            ));
        }
        Ok(count)
    }

    fn read_next<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        match self.reader.read_next_clear_bit(2, buf)? {
            0b11 => {
                let Layout {
                    value_bits,
                    leading_zero_bits,
                    meaningful_bits,
                } = self.layout;
                let leading = self.reader.read_bits(leading_zero_bits, buf)? as u8;
                let field = self.reader.read_bits(meaningful_bits, buf)?;
                let meaningful = self.version.decode_meaningful(field, value_bits);
                let trailing = value_bits
                    .checked_sub(leading)
                    .and_then(|rest| rest.checked_sub(meaningful))
                    .ok_or_else(|| {
                        CodecError::MalformedHeader(format!(
                            "window of {leading} leading and {meaningful} meaningful bits exceeds {value_bits} bits"
                        ))
                    })?;
                self.stored_leading_zeros = leading;
                self.stored_trailing_zeros = trailing;
                self.apply_xor(buf)
            }
            0b10 => self.apply_xor(buf),
            _ => Ok(()),
        }
    }

    fn apply_xor<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        let meaningful = self
            .layout
            .value_bits
            .checked_sub(self.stored_leading_zeros)
            .and_then(|rest| rest.checked_sub(self.stored_trailing_zeros))
            .filter(|&m| m > 0)
            .ok_or_else(|| {
                CodecError::MalformedHeader("window reuse before any window was written".into())
            })?;
        let xor = self.reader.read_bits(meaningful, buf)? << self.stored_trailing_zeros;
        self.stored_value ^= xor;
        Ok(())
    }
}

impl ValueDecoder for GorillaDecoder {
    fn has_next<B: Buf>(&self, buf: &B) -> bool {
        match self.remaining {
            None => buf.has_remaining(),
            Some(n) => n > 0,
        }
    }

    fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value> {
        let remaining = match self.remaining {
            Some(n) => n,
            None => {
                let n = self.read_count(buf)?;
                self.remaining = Some(n);
                n
            }
        };
        if remaining == 0 {
            return Err(CodecError::BufferUnderflow);
        }

        if self.first_value_was_read {
            self.read_next(buf)?;
        } else {
            self.stored_value = self.reader.read_bits(self.layout.value_bits, buf)?;
            self.first_value_was_read = true;
        }
        self.remaining = Some(remaining - 1);
        value_of(self.data_type, self.version.encoding(), self.stored_value)
    }

    fn reset(&mut self) {
        self.reader.reset();
        self.remaining = None;
        self.first_value_was_read = false;
        self.stored_value = 0;
        self.stored_leading_zeros = NO_WINDOW;
        self.stored_trailing_zeros = 0;
    }
}
