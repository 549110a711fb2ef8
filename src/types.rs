use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{CodecError, Result};

/// Logical type of a column. The discriminant is the id stored in page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Boolean = 0,
    Int32 = 1,
    Int64 = 2,
    Float = 3,
    Double = 4,
    Text = 5,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Boolean,
        DataType::Int32,
        DataType::Int64,
        DataType::Float,
        DataType::Double,
        DataType::Text,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| CodecError::MalformedHeader(format!("unknown data type id {id}")))
    }

    /// Width in bits of the value's bit pattern, `None` for variable-length text.
    pub fn bit_width(self) -> Option<u8> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Int32 | DataType::Float => Some(32),
            DataType::Int64 | DataType::Double => Some(64),
            DataType::Text => None,
        }
    }

    /// Encodings that may be used for this type.
    pub fn supported_encodings(self) -> &'static [Encoding] {
        match self {
            DataType::Boolean => &[Encoding::Rle, Encoding::Plain],
            DataType::Int32 | DataType::Int64 | DataType::Float | DataType::Double => &[
                Encoding::Rle,
                Encoding::Plain,
                Encoding::Ts2Diff,
                Encoding::Gorilla,
                Encoding::GorillaV2,
            ],
            DataType::Text => &[Encoding::Plain],
        }
    }

    #[inline]
    pub fn supports(self, encoding: Encoding) -> bool {
        self.supported_encodings().contains(&encoding)
    }

    /// Fails with `UnsupportedTypeEncoding` when the pair is not in the table.
    pub fn check_encoding(self, encoding: Encoding) -> Result<()> {
        if self.supports(encoding) {
            Ok(())
        } else {
            tracing::debug!(data_type = %self, %encoding, "rejecting unsupported type/encoding pair");
            Err(CodecError::UnsupportedTypeEncoding {
                data_type: self,
                encoding,
            })
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Text => "TEXT",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CodecError::UnknownDataType(s.to_string()))
    }
}

/// Value encoding of a stream. The discriminant is the id stored in page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encoding {
    Plain = 0,
    Rle = 1,
    Ts2Diff = 2,
    /// Legacy Gorilla layout: fixed-width count header, lazy byte refill.
    Gorilla = 3,
    /// Revised Gorilla layout: varint count header, eager byte refill.
    GorillaV2 = 4,
}

impl Encoding {
    pub const ALL: [Encoding; 5] = [
        Encoding::Plain,
        Encoding::Rle,
        Encoding::Ts2Diff,
        Encoding::Gorilla,
        Encoding::GorillaV2,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| CodecError::MalformedHeader(format!("unknown encoding id {id}")))
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Plain => "PLAIN",
            Encoding::Rle => "RLE",
            Encoding::Ts2Diff => "TS_2DIFF",
            Encoding::Gorilla => "GORILLA",
            Encoding::GorillaV2 => "GORILLA_V2",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("GORILLA_V1") {
            return Ok(Encoding::Gorilla);
        }
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CodecError::UnknownEncoding(s.to_string()))
    }
}

/// A single column value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Text(Bytes),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Text(_) => DataType::Text,
        }
    }

    /// The value's bit pattern, right-aligned in a `u64`. Floats are not
    /// reinterpreted numerically, so NaN payloads and `-0.0` survive.
    pub fn raw_bits(&self) -> Option<u64> {
        match *self {
            Value::Boolean(b) => Some(b as u64),
            Value::Int32(v) => Some(v as u32 as u64),
            Value::Int64(v) => Some(v as u64),
            Value::Float(v) => Some(v.to_bits() as u64),
            Value::Double(v) => Some(v.to_bits()),
            Value::Text(_) => None,
        }
    }

    /// Inverse of [`Value::raw_bits`]. Bits above the type's width are ignored.
    pub fn from_raw_bits(data_type: DataType, bits: u64) -> Option<Value> {
        match data_type {
            DataType::Boolean => Some(Value::Boolean(bits & 1 == 1)),
            DataType::Int32 => Some(Value::Int32(bits as u32 as i32)),
            DataType::Int64 => Some(Value::Int64(bits as i64)),
            DataType::Float => Some(Value::Float(f32::from_bits(bits as u32))),
            DataType::Double => Some(Value::Double(f64::from_bits(bits))),
            DataType::Text => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Text(v)
    }
}
