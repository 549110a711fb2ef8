//! RLE: runs of equal values collapse to `(length, value)`; everything else is
//! bit-packed in groups of eight.
//!
//! The payload is a sequence of byte-aligned segments:
//!
//! ```text
//! [flag:1][length:31]
//!   flag = 1  repeated run:  [value:W]
//!   flag = 0  literal run:   ceil(length / 8) x [width:7][min:W][n x width]
//! ```
//!
//! `W` is the natural width of the type (1, 32 or 64 bits). Literal members are
//! stored as `value - min` of their group, packed to the smallest width that
//! holds the group's largest offset. The last group of a literal run holds
//! `length mod 8` members (8 when divisible).

use bytes::{Buf, Bytes};

use super::{
    bitmask, bits_of, bits_required, fixed_width, sign_extend, value_of, ValueDecoder,
    ValueEncoder,
};
use crate::bitbuffer::{BitReader, BitWriter, Refill};
use crate::error::{CodecError, Result};
use crate::types::{DataType, Encoding, Value};

const LENGTH_BITS: u8 = 31;
const WIDTH_BITS: u8 = 7;
const GROUP_SIZE: usize = 8;
/// Equal neighbours needed before they are written as a repeated run.
const MIN_REPEAT: usize = 2;

#[derive(Debug)]
pub struct RleEncoder {
    data_type: DataType,
    width: u8,
    max_run_length: usize,
    values: Vec<u64>,
    out: BitWriter,
}

impl RleEncoder {
    pub fn new(data_type: DataType, max_run_length: u32) -> Result<Self> {
        Ok(Self {
            data_type,
            width: fixed_width(data_type, Encoding::Rle)?,
            max_run_length: max_run_length.max(1) as usize,
            values: Vec::new(),
            out: BitWriter::with_capacity(128),
        })
    }

    fn write_run(&mut self, value: u64, len: usize) {
        self.out.write_bit(true);
        self.out.write_bits(len as u64, LENGTH_BITS);
        self.out.write_bits(value, self.width);
        self.out.align();
    }

    fn write_literals(&mut self, values: &[u64]) {
        for segment in values.chunks(self.max_run_length) {
            self.out.write_bit(false);
            self.out.write_bits(segment.len() as u64, LENGTH_BITS);
            for group in segment.chunks(GROUP_SIZE) {
                self.write_group(group);
            }
            self.out.align();
        }
    }

    fn write_group(&mut self, group: &[u64]) {
        let width = self.width;
        let min = group
            .iter()
            .map(|&v| sign_extend(v, width))
            .min()
            .unwrap_or(0);
        let offset = |v: u64| sign_extend(v, width).wrapping_sub(min) as u64;
        let bit_width = group.iter().map(|&v| bits_required(offset(v))).max().unwrap_or(0);

        self.out.write_bits(bit_width as u64, WIDTH_BITS);
        self.out.write_bits(min as u64 & bitmask(width), width);
        for &v in group {
            self.out.write_bits(offset(v), bit_width);
        }
    }
}

impl ValueEncoder for RleEncoder {
    fn encode(&mut self, value: &Value) -> Result<()> {
        self.values.push(bits_of(self.data_type, value)?);
        Ok(())
    }

    fn flush(&mut self) -> Result<Bytes> {
        let values = std::mem::take(&mut self.values);
        let mut literal_start = 0;
        let mut i = 0;
        while i < values.len() {
            let mut j = i + 1;
            while j < values.len() && values[j] == values[i] {
                j += 1;
            }
            if j - i >= MIN_REPEAT {
                self.write_literals(&values[literal_start..i]);
                let mut left = j - i;
                while left > 0 {
                    let len = left.min(self.max_run_length);
                    self.write_run(values[i], len);
                    left -= len;
                }
                literal_start = j;
            }
            i = j;
        }
        self.write_literals(&values[literal_start..]);
        Ok(self.out.finish())
    }

    fn reset(&mut self) {
        self.values.clear();
        self.out.clear();
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Idle,
    Run {
        value: u64,
        remaining: u32,
    },
    Literal {
        /// Members not yet unpacked into `group`.
        remaining: u32,
        group: [u64; GROUP_SIZE],
        len: usize,
        pos: usize,
    },
}

impl Segment {
    fn pending(&self) -> u64 {
        match *self {
            Segment::Idle => 0,
            Segment::Run { remaining, .. } => remaining as u64,
            Segment::Literal {
                remaining, len, pos, ..
            } => remaining as u64 + (len - pos) as u64,
        }
    }
}

#[derive(Debug)]
pub struct RleDecoder {
    data_type: DataType,
    width: u8,
    reader: BitReader,
    segment: Segment,
}

impl RleDecoder {
    pub fn new(data_type: DataType) -> Result<Self> {
        Ok(Self {
            data_type,
            width: fixed_width(data_type, Encoding::Rle)?,
            reader: BitReader::new(Refill::Lazy),
            segment: Segment::Idle,
        })
    }

    fn read_segment_header<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        self.reader.align();
        let is_run = self.reader.read_bit(buf)?;
        let len = self.reader.read_bits(LENGTH_BITS, buf)? as u32;
        if len == 0 {
            return Err(CodecError::MalformedHeader(
                "RLE segment with zero length".into(),
            ));
        }
        self.segment = if is_run {
            Segment::Run {
                value: self.reader.read_bits(self.width, buf)?,
                remaining: len,
            }
        } else {
            Segment::Literal {
                remaining: len,
                group: [0; GROUP_SIZE],
                len: 0,
                pos: 0,
            }
        };
        Ok(())
    }

    fn read_group<B: Buf>(
        reader: &mut BitReader,
        width: u8,
        group: &mut [u64; GROUP_SIZE],
        n: usize,
        buf: &mut B,
    ) -> Result<()> {
        let bit_width = reader.read_bits(WIDTH_BITS, buf)? as u8;
        if bit_width > width {
            return Err(CodecError::MalformedHeader(format!(
                "RLE group width {bit_width} exceeds {width}-bit values"
            )));
        }
        let min = sign_extend(reader.read_bits(width, buf)?, width);
        for slot in group.iter_mut().take(n) {
            let offset = reader.read_bits(bit_width, buf)?;
            *slot = min.wrapping_add(offset as i64) as u64 & bitmask(width);
        }
        Ok(())
    }
}

impl ValueDecoder for RleDecoder {
    fn has_next<B: Buf>(&self, buf: &B) -> bool {
        self.segment.pending() > 0 || buf.has_remaining()
    }

    fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value> {
        loop {
            match &mut self.segment {
                Segment::Run { value, remaining } if *remaining > 0 => {
                    *remaining -= 1;
                    return value_of(self.data_type, Encoding::Rle, *value);
                }
                Segment::Literal {
                    remaining,
                    group,
                    len,
                    pos,
                } if *pos < *len || *remaining > 0 => {
                    if *pos == *len {
                        let n = (*remaining).min(GROUP_SIZE as u32) as usize;
                        Self::read_group(&mut self.reader, self.width, group, n, buf)?;
                        *remaining -= n as u32;
                        *len = n;
                        *pos = 0;
                    }
                    let bits = group[*pos];
                    *pos += 1;
                    return value_of(self.data_type, Encoding::Rle, bits);
                }
                _ => self.read_segment_header(buf)?,
            }
        }
    }

    fn reset(&mut self) {
        self.reader.reset();
        self.segment = Segment::Idle;
    }
}
