//! TS_2DIFF: blocks of eight values, each stored as a seed plus packed first
//! differences relative to the block's smallest difference.
//!
//! FLOAT and DOUBLE streams open with a one-byte mode: `0` delta-codes the raw
//! IEEE-754 bit patterns, `1` is followed by an 8-byte `f64` scale and codes
//! `round(value * scale)` as a 64-bit integer. Integer streams have no header.
//!
//! Each block is byte-aligned:
//!
//! ```text
//! [count:4][seed:W]                                 count == 1
//! [count:4][seed:W][min:W][width:7][(count-1) x width]  count in 2..=8
//! ```
//!
//! All arithmetic is modulo 2^W, where W is 32 for INT32 and raw FLOAT and 64
//! otherwise, so any input round-trips without overflow.

use bytes::{Buf, Bytes};

use super::{
    bitmask, bits_of, bits_required, fixed_width, sign_extend, value_of, ValueDecoder,
    ValueEncoder,
};
use crate::bitbuffer::{BitReader, BitWriter, Refill};
use crate::error::{CodecError, Result};
use crate::types::{DataType, Encoding, Value};

const COUNT_BITS: u8 = 4;
const WIDTH_BITS: u8 = 7;
const BLOCK_SIZE: usize = 8;
const MODE_BITS: u8 = 8;
const MODE_RAW: u64 = 0;
const MODE_FIXED_POINT: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Domain {
    Raw,
    FixedPoint(f64),
}

#[inline]
fn is_floating(data_type: DataType) -> bool {
    matches!(data_type, DataType::Float | DataType::Double)
}

fn quantize(value: f64, scale: f64) -> Result<i64> {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
        return Err(CodecError::ArithmeticOverflow(format!(
            "{value} at scale {scale} does not fit a 64-bit fixed-point value"
        )));
    }
    Ok(scaled as i64)
}

#[derive(Debug)]
pub struct Ts2DiffEncoder {
    data_type: DataType,
    domain: Domain,
    /// Width of the integer domain the deltas live in.
    width: u8,
    block: Vec<u64>,
    out: BitWriter,
    header_written: bool,
}

impl Ts2DiffEncoder {
    pub fn new(data_type: DataType, fixed_point_scale: Option<f64>) -> Result<Self> {
        let natural = fixed_width(data_type, Encoding::Ts2Diff)?;
        let domain = match fixed_point_scale {
            Some(scale) if is_floating(data_type) => Domain::FixedPoint(scale),
            _ => Domain::Raw,
        };
        let width = match domain {
            Domain::Raw => natural,
            Domain::FixedPoint(_) => 64,
        };
        Ok(Self {
            data_type,
            domain,
            width,
            block: Vec::with_capacity(BLOCK_SIZE),
            out: BitWriter::with_capacity(128),
            header_written: false,
        })
    }

    fn write_header(&mut self) {
        if is_floating(self.data_type) {
            match self.domain {
                Domain::Raw => self.out.write_bits(MODE_RAW, MODE_BITS),
                Domain::FixedPoint(scale) => {
                    self.out.write_bits(MODE_FIXED_POINT, MODE_BITS);
                    self.out.write_bits(scale.to_bits(), 64);
                }
            }
        }
        self.header_written = true;
    }

    fn write_block(&mut self) {
        let width = self.width;
        let mask = bitmask(width);
        let n = self.block.len();

        self.out.write_bits(n as u64, COUNT_BITS);
        self.out.write_bits(self.block[0], width);
        if n > 1 {
            let deltas: Vec<i64> = self
                .block
                .windows(2)
                .map(|w| sign_extend(w[1].wrapping_sub(w[0]) & mask, width))
                .collect();
            let min = deltas.iter().copied().min().unwrap_or(0);
            let offsets: Vec<u64> = deltas
                .iter()
                .map(|&d| d.wrapping_sub(min) as u64 & mask)
                .collect();
            let bit_width = offsets.iter().map(|&e| bits_required(e)).max().unwrap_or(0);

            self.out.write_bits(min as u64 & mask, width);
            self.out.write_bits(bit_width as u64, WIDTH_BITS);
            for e in offsets {
                self.out.write_bits(e, bit_width);
            }
        }
        self.out.align();
        self.block.clear();
    }
}

impl ValueEncoder for Ts2DiffEncoder {
    fn encode(&mut self, value: &Value) -> Result<()> {
        let bits = match (self.domain, value) {
            (Domain::FixedPoint(scale), Value::Float(v)) => quantize(*v as f64, scale)? as u64,
            (Domain::FixedPoint(scale), Value::Double(v)) => quantize(*v, scale)? as u64,
            _ => bits_of(self.data_type, value)?,
        };
        if !self.header_written {
            self.write_header();
        }
        self.block.push(bits);
        if self.block.len() == BLOCK_SIZE {
            self.write_block();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<Bytes> {
        if !self.block.is_empty() {
            self.write_block();
        }
        self.header_written = false;
        Ok(self.out.finish())
    }

    fn reset(&mut self) {
        self.block.clear();
        self.out.clear();
        self.header_written = false;
    }
}

#[derive(Debug)]
pub struct Ts2DiffDecoder {
    data_type: DataType,
    natural: u8,
    /// `None` until the stream header has been read.
    domain: Option<Domain>,
    width: u8,
    reader: BitReader,
    block: [u64; BLOCK_SIZE],
    len: usize,
    pos: usize,
}

impl Ts2DiffDecoder {
    pub fn new(data_type: DataType) -> Result<Self> {
        let natural = fixed_width(data_type, Encoding::Ts2Diff)?;
        Ok(Self {
            data_type,
            natural,
            domain: None,
            width: natural,
            reader: BitReader::new(Refill::Lazy),
            block: [0; BLOCK_SIZE],
            len: 0,
            pos: 0,
        })
    }

    fn read_header<B: Buf>(&mut self, buf: &mut B) -> Result<Domain> {
        if !is_floating(self.data_type) {
            return Ok(Domain::Raw);
        }
        match self.reader.read_bits(MODE_BITS, buf)? {
            MODE_RAW => Ok(Domain::Raw),
            MODE_FIXED_POINT => {
                let scale = f64::from_bits(self.reader.read_bits(64, buf)?);
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(CodecError::MalformedHeader(format!(
                        "invalid fixed-point scale {scale}"
                    )));
                }
                Ok(Domain::FixedPoint(scale))
            }
            mode => Err(CodecError::MalformedHeader(format!(
                "unknown TS_2DIFF mode {mode}"
            ))),
        }
    }

    fn read_block<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        let width = self.width;
        let mask = bitmask(width);

        self.reader.align();
        let count = self.reader.read_bits(COUNT_BITS, buf)? as usize;
        if count == 0 || count > BLOCK_SIZE {
            return Err(CodecError::MalformedHeader(format!(
                "TS_2DIFF block count {count} outside 1..={BLOCK_SIZE}"
            )));
        }
        let mut prev = self.reader.read_bits(width, buf)?;
        self.block[0] = prev;
        if count > 1 {
            let min = sign_extend(self.reader.read_bits(width, buf)?, width);
            let bit_width = self.reader.read_bits(WIDTH_BITS, buf)? as u8;
            if bit_width > width {
                return Err(CodecError::MalformedHeader(format!(
                    "TS_2DIFF width {bit_width} exceeds {width}-bit values"
                )));
            }
            for slot in &mut self.block[1..count] {
                let offset = self.reader.read_bits(bit_width, buf)?;
                let delta = min.wrapping_add(offset as i64) as u64;
                prev = prev.wrapping_add(delta) & mask;
                *slot = prev;
            }
        }
        self.len = count;
        self.pos = 0;
        Ok(())
    }
}

impl ValueDecoder for Ts2DiffDecoder {
    fn has_next<B: Buf>(&self, buf: &B) -> bool {
        self.pos < self.len || buf.has_remaining()
    }

    fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value> {
        let domain = match self.domain {
            Some(domain) => domain,
            None => {
                let domain = self.read_header(buf)?;
                self.width = match domain {
                    Domain::Raw => self.natural,
                    Domain::FixedPoint(_) => 64,
                };
                self.domain = Some(domain);
                domain
            }
        };
        if self.pos == self.len {
            self.read_block(buf)?;
        }
        let bits = self.block[self.pos];
        self.pos += 1;

        match domain {
            Domain::Raw => value_of(self.data_type, Encoding::Ts2Diff, bits),
            Domain::FixedPoint(scale) => {
                let restored = bits as i64 as f64 / scale;
                Ok(match self.data_type {
                    DataType::Float => Value::Float(restored as f32),
                    _ => Value::Double(restored),
                })
            }
        }
    }

    fn reset(&mut self) {
        self.reader.reset();
        self.domain = None;
        self.width = self.natural;
        self.len = 0;
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(data_type: DataType, scale: Option<f64>, values: &[Value]) -> Bytes {
        let mut enc = Ts2DiffEncoder::new(data_type, scale).unwrap();
        for v in values {
            enc.encode(v).unwrap();
        }
        enc.flush().unwrap()
    }

    /// Decodes the payload, also returning the member count of every block.
    fn decode(data_type: DataType, mut payload: Bytes) -> (Vec<Value>, Vec<usize>) {
        let mut dec = Ts2DiffDecoder::new(data_type).unwrap();
        let mut out = Vec::new();
        let mut blocks = Vec::new();
        while dec.has_next(&payload) {
            out.push(dec.next(&mut payload).unwrap());
            if dec.pos == 1 {
                blocks.push(dec.len);
            }
        }
        (out, blocks)
    }

    fn longs(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
        values.into_iter().map(Value::Int64).collect()
    }

    #[test]
    fn test_block_sizes_follow_length() {
        for (n, expected) in [
            (1, vec![1]),
            (8, vec![8]),
            (11, vec![8, 3]),
            (16, vec![8, 8]),
            (17, vec![8, 8, 1]),
        ] {
            let input = longs((0..n).map(|i| 1_000 + i * 7 - (i % 3)));
            let (output, blocks) = decode(DataType::Int64, encode(DataType::Int64, None, &input));
            assert_eq!(output, input, "n = {n}");
            assert_eq!(blocks, expected, "n = {n}");
        }
    }

    #[test]
    fn test_regular_timestamps_pack_to_zero_width() {
        let input = longs((0..8).map(|i| 1_609_459_200_000 + i * 60_000));
        let payload = encode(DataType::Int64, None, &input);
        // count + seed + min + width, no member bits: 4 + 64 + 64 + 7 = 139 bits.
        assert_eq!(payload.len(), 18);
        assert_eq!(decode(DataType::Int64, payload).0, input);
    }

    #[test]
    fn test_wrapping_deltas() {
        let input = longs([i64::MAX, i64::MIN, 0, i64::MIN, i64::MAX, -1]);
        assert_eq!(
            decode(DataType::Int64, encode(DataType::Int64, None, &input)).0,
            input
        );

        let input: Vec<Value> = [i32::MIN, i32::MAX, -1, 0, 5, i32::MIN]
            .into_iter()
            .map(Value::Int32)
            .collect();
        assert_eq!(
            decode(DataType::Int32, encode(DataType::Int32, None, &input)).0,
            input
        );
    }

    #[test]
    fn test_raw_float_bits_are_lossless() {
        let input: Vec<Value> = [0.1f32, -0.0, f32::NAN, 3.5, f32::MIN_POSITIVE]
            .into_iter()
            .map(Value::Float)
            .collect();
        let (output, _) = decode(DataType::Float, encode(DataType::Float, None, &input));
        let bits = |v: &[Value]| v.iter().map(|x| x.raw_bits().unwrap()).collect::<Vec<_>>();
        assert_eq!(bits(&output), bits(&input));
    }

    #[test]
    fn test_fixed_point_doubles() {
        let input: Vec<Value> = [1.25, 1.5, 2.75, -3.01, 0.1]
            .into_iter()
            .map(Value::Double)
            .collect();
        let payload = encode(DataType::Double, Some(100.0), &input);
        assert_eq!(payload[0], MODE_FIXED_POINT as u8);
        assert_eq!(decode(DataType::Double, payload).0, input);
    }

    #[test]
    fn test_fixed_point_rounds_to_scale() {
        let input = [Value::Float(1.2345)];
        let (output, _) = decode(DataType::Float, encode(DataType::Float, Some(10.0), &input));
        assert_eq!(output, vec![Value::Float(1.2)]);
    }

    #[test]
    fn test_fixed_point_overflow_is_reported() {
        let mut enc = Ts2DiffEncoder::new(DataType::Double, Some(1000.0)).unwrap();
        assert!(matches!(
            enc.encode(&Value::Double(1e300)),
            Err(CodecError::ArithmeticOverflow(_))
        ));
        assert!(matches!(
            enc.encode(&Value::Double(f64::NAN)),
            Err(CodecError::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn test_scale_ignored_for_integers() {
        let input = longs([5, 6, 7]);
        let payload = encode(DataType::Int64, Some(100.0), &input);
        assert_eq!(decode(DataType::Int64, payload).0, input);
    }

    #[test]
    fn test_empty_payload() {
        let payload = encode(DataType::Double, None, &[]);
        assert!(payload.is_empty());
        assert!(decode(DataType::Double, payload).0.is_empty());
    }

    #[test]
    fn test_bad_block_count() {
        let mut dec = Ts2DiffDecoder::new(DataType::Int64).unwrap();
        let mut payload = Bytes::from_static(&[0x00, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            dec.next(&mut payload),
            Err(CodecError::MalformedHeader(_))
        ));

        let mut dec = Ts2DiffDecoder::new(DataType::Int64).unwrap();
        let mut payload = Bytes::from_static(&[0x90, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            dec.next(&mut payload),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_bad_width() {
        let mut w = BitWriter::new();
        w.write_bits(2, COUNT_BITS);
        w.write_bits(0, 32);
        w.write_bits(0, 32);
        w.write_bits(33, WIDTH_BITS);
        let mut payload = w.finish();
        let mut dec = Ts2DiffDecoder::new(DataType::Int32).unwrap();
        assert!(matches!(
            dec.next(&mut payload),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_unknown_mode() {
        let mut dec = Ts2DiffDecoder::new(DataType::Double).unwrap();
        let mut payload = Bytes::from_static(&[7, 0x10]);
        assert!(matches!(
            dec.next(&mut payload),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_truncated_block_underflows() {
        let payload = encode(DataType::Int64, None, &longs([1, 2, 30, 400]));
        let mut truncated = payload.slice(..payload.len() - 1);
        let mut dec = Ts2DiffDecoder::new(DataType::Int64).unwrap();
        assert_eq!(dec.next(&mut truncated), Err(CodecError::BufferUnderflow));
    }

    #[test]
    fn test_reset_rereads_header() {
        let payload = encode(DataType::Double, Some(4.0), &[Value::Double(0.25)]);
        let mut dec = Ts2DiffDecoder::new(DataType::Double).unwrap();
        let mut first = payload.clone();
        assert_eq!(dec.next(&mut first).unwrap(), Value::Double(0.25));
        dec.reset();
        let mut second = payload;
        assert_eq!(dec.next(&mut second).unwrap(), Value::Double(0.25));
        assert!(!dec.has_next(&second));
    }
}
