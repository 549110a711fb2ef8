//! PLAIN: values written verbatim, one after another.
//!
//! | type    | layout                         |
//! |---------|--------------------------------|
//! | BOOLEAN | 1 byte, `0` or `1`             |
//! | INT32   | zigzag LEB128 varint           |
//! | INT64   | 8 bytes big-endian             |
//! | FLOAT   | 4 bytes big-endian IEEE-754    |
//! | DOUBLE  | 8 bytes big-endian IEEE-754    |
//! | TEXT    | LEB128 length, then the bytes  |

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ensure, ValueDecoder, ValueEncoder};
use crate::error::{CodecError, Result};
use crate::types::{DataType, Value};
use crate::varint;

#[derive(Debug, Default)]
pub struct PlainEncoder {
    out: BytesMut,
}

impl PlainEncoder {
    pub fn new() -> Self {
        Self {
            out: BytesMut::with_capacity(128),
        }
    }
}

impl ValueEncoder for PlainEncoder {
    fn encode(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Boolean(b) => self.out.put_u8(*b as u8),
            Value::Int32(v) => varint::put_zigzag_i32(&mut self.out, *v),
            Value::Int64(v) => self.out.put_i64(*v),
            Value::Float(v) => self.out.put_f32(*v),
            Value::Double(v) => self.out.put_f64(*v),
            Value::Text(bytes) => {
                varint::put_uvarint(&mut self.out, bytes.len() as u64);
                self.out.put_slice(bytes);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<Bytes> {
        Ok(self.out.split().freeze())
    }

    fn reset(&mut self) {
        self.out.clear();
    }
}

/// Stateless apart from its data type: every value is self-delimiting.
#[derive(Debug)]
pub struct PlainDecoder {
    data_type: DataType,
}

impl PlainDecoder {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl ValueDecoder for PlainDecoder {
    fn has_next<B: Buf>(&self, buf: &B) -> bool {
        buf.has_remaining()
    }

    fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value> {
        let value = match self.data_type {
            DataType::Boolean => {
                ensure(buf, 1)?;
                match buf.get_u8() {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    other => {
                        return Err(CodecError::MalformedHeader(format!(
                            "invalid boolean byte {other:#04x}"
                        )))
                    }
                }
            }
            DataType::Int32 => Value::Int32(varint::get_zigzag_i32(buf)?),
            DataType::Int64 => {
                ensure(buf, 8)?;
                Value::Int64(buf.get_i64())
            }
            DataType::Float => {
                ensure(buf, 4)?;
                Value::Float(buf.get_f32())
            }
            DataType::Double => {
                ensure(buf, 8)?;
                Value::Double(buf.get_f64())
            }
            DataType::Text => {
                let len = varint::get_uvarint(buf)?;
                let len = usize::try_from(len).map_err(|_| {
                    CodecError::MalformedHeader(format!("text length {len} too large"))
                })?;
                ensure(buf, len)?;
                Value::Text(buf.copy_to_bytes(len))
            }
        };
        Ok(value)
    }

    fn reset(&mut self) {}
}
