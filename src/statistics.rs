//! Page and chunk statistics, folded alongside encoding.
//!
//! Statistics live next to the encoded streams, never inside them, so a reader
//! can skip a page on its min/max or time range without decoding it.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::ensure;
use crate::error::{CodecError, Result};
use crate::types::{DataType, Value};
use crate::varint;

/// Addition used by a running sum.
trait Sum: Copy {
    fn add(self, other: Self) -> Result<Self>;
}

impl Sum for i64 {
    fn add(self, other: Self) -> Result<Self> {
        self.checked_add(other)
            .ok_or_else(|| CodecError::ArithmeticOverflow("INT32 sum exceeds i64".into()))
    }
}

impl Sum for f64 {
    fn add(self, other: Self) -> Result<Self> {
        Ok(self + other)
    }
}

/// Running summary of a numeric column. `sum` is widened from `T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStatistics<T, S> {
    pub min: T,
    pub max: T,
    pub first: T,
    pub last: T,
    pub sum: S,
}

impl<T: Copy + PartialOrd, S: Sum> NumericStatistics<T, S> {
    fn new(value: T, sum: S) -> Self {
        Self {
            min: value,
            max: value,
            first: value,
            last: value,
            sum,
        }
    }

    // NaN never compares below or above anything, so it only becomes min or
    // max when it is the first value.
    fn observe(&mut self, value: T, widened: S, is_first: bool, is_last: bool) -> Result<()> {
        self.sum = self.sum.add(widened)?;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        if is_first {
            self.first = value;
        }
        if is_last {
            self.last = value;
        }
        Ok(())
    }

    fn absorb(&mut self, other: &Self, take_first: bool, take_last: bool) -> Result<()> {
        self.sum = self.sum.add(other.sum)?;
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        if take_first {
            self.first = other.first;
        }
        if take_last {
            self.last = other.last;
        }
        Ok(())
    }
}

/// Per-type value summary.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueStatistics {
    /// `sum` counts the `true` values.
    Boolean { first: bool, last: bool, sum: u64 },
    Int32(NumericStatistics<i32, i64>),
    Int64(NumericStatistics<i64, f64>),
    Float(NumericStatistics<f32, f64>),
    Double(NumericStatistics<f64, f64>),
    Text { first: Bytes, last: Bytes },
}

impl ValueStatistics {
    fn new(value: &Value) -> Self {
        match value {
            Value::Boolean(b) => ValueStatistics::Boolean {
                first: *b,
                last: *b,
                sum: *b as u64,
            },
            Value::Int32(v) => ValueStatistics::Int32(NumericStatistics::new(*v, *v as i64)),
            Value::Int64(v) => ValueStatistics::Int64(NumericStatistics::new(*v, *v as f64)),
            Value::Float(v) => ValueStatistics::Float(NumericStatistics::new(*v, *v as f64)),
            Value::Double(v) => ValueStatistics::Double(NumericStatistics::new(*v, *v)),
            Value::Text(s) => ValueStatistics::Text {
                first: s.clone(),
                last: s.clone(),
            },
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            ValueStatistics::Boolean { .. } => DataType::Boolean,
            ValueStatistics::Int32(_) => DataType::Int32,
            ValueStatistics::Int64(_) => DataType::Int64,
            ValueStatistics::Float(_) => DataType::Float,
            ValueStatistics::Double(_) => DataType::Double,
            ValueStatistics::Text { .. } => DataType::Text,
        }
    }

    fn observe(&mut self, value: &Value, is_first: bool, is_last: bool) -> Result<()> {
        match (self, value) {
            (ValueStatistics::Boolean { first, last, sum }, Value::Boolean(b)) => {
                *sum += *b as u64;
                if is_first {
                    *first = *b;
                }
                if is_last {
                    *last = *b;
                }
            }
            (ValueStatistics::Int32(s), Value::Int32(v)) => {
                s.observe(*v, *v as i64, is_first, is_last)?
            }
            (ValueStatistics::Int64(s), Value::Int64(v)) => {
                s.observe(*v, *v as f64, is_first, is_last)?
            }
            (ValueStatistics::Float(s), Value::Float(v)) => {
                s.observe(*v, *v as f64, is_first, is_last)?
            }
            (ValueStatistics::Double(s), Value::Double(v)) => {
                s.observe(*v, *v, is_first, is_last)?
            }
            (ValueStatistics::Text { first, last }, Value::Text(s)) => {
                if is_first {
                    *first = s.clone();
                }
                if is_last {
                    *last = s.clone();
                }
            }
            (this, value) => {
                return Err(CodecError::TypeMismatch {
                    expected: this.data_type(),
                    found: value.data_type(),
                })
            }
        }
        Ok(())
    }

    fn absorb(&mut self, other: &ValueStatistics, take_first: bool, take_last: bool) -> Result<()> {
        match (self, other) {
            (
                ValueStatistics::Boolean { first, last, sum },
                ValueStatistics::Boolean {
                    first: other_first,
                    last: other_last,
                    sum: other_sum,
                },
            ) => {
                *sum = sum.checked_add(*other_sum).ok_or_else(|| {
                    CodecError::ArithmeticOverflow("BOOLEAN sum exceeds u64".into())
                })?;
                if take_first {
                    *first = *other_first;
                }
                if take_last {
                    *last = *other_last;
                }
            }
            (ValueStatistics::Int32(a), ValueStatistics::Int32(b)) => {
                a.absorb(b, take_first, take_last)?
            }
            (ValueStatistics::Int64(a), ValueStatistics::Int64(b)) => {
                a.absorb(b, take_first, take_last)?
            }
            (ValueStatistics::Float(a), ValueStatistics::Float(b)) => {
                a.absorb(b, take_first, take_last)?
            }
            (ValueStatistics::Double(a), ValueStatistics::Double(b)) => {
                a.absorb(b, take_first, take_last)?
            }
            (
                ValueStatistics::Text { first, last },
                ValueStatistics::Text {
                    first: other_first,
                    last: other_last,
                },
            ) => {
                if take_first {
                    *first = other_first.clone();
                }
                if take_last {
                    *last = other_last.clone();
                }
            }
            (this, other) => {
                return Err(CodecError::TypeMismatch {
                    expected: this.data_type(),
                    found: other.data_type(),
                })
            }
        }
        Ok(())
    }

    fn serialize<B: BufMut>(&self, buf: &mut B) {
        match self {
            ValueStatistics::Boolean { first, last, sum } => {
                buf.put_u8(*first as u8);
                buf.put_u8(*last as u8);
                varint::put_uvarint(buf, *sum);
            }
            ValueStatistics::Int32(s) => {
                for v in [s.min, s.max, s.first, s.last] {
                    buf.put_i32(v);
                }
                buf.put_i64(s.sum);
            }
            ValueStatistics::Int64(s) => {
                for v in [s.min, s.max, s.first, s.last] {
                    buf.put_i64(v);
                }
                buf.put_f64(s.sum);
            }
            ValueStatistics::Float(s) => {
                for v in [s.min, s.max, s.first, s.last] {
                    buf.put_f32(v);
                }
                buf.put_f64(s.sum);
            }
            ValueStatistics::Double(s) => {
                for v in [s.min, s.max, s.first, s.last, s.sum] {
                    buf.put_f64(v);
                }
            }
            ValueStatistics::Text { first, last } => {
                for s in [first, last] {
                    varint::put_uvarint(buf, s.len() as u64);
                    buf.put_slice(s);
                }
            }
        }
    }

    fn deserialize<B: Buf>(data_type: DataType, buf: &mut B) -> Result<Self> {
        let stats = match data_type {
            DataType::Boolean => {
                ensure(buf, 2)?;
                let first = get_bool(buf)?;
                let last = get_bool(buf)?;
                let sum = varint::get_uvarint(buf)?;
                ValueStatistics::Boolean { first, last, sum }
            }
            DataType::Int32 => {
                ensure(buf, 4 * 4 + 8)?;
                ValueStatistics::Int32(NumericStatistics {
                    min: buf.get_i32(),
                    max: buf.get_i32(),
                    first: buf.get_i32(),
                    last: buf.get_i32(),
                    sum: buf.get_i64(),
                })
            }
            DataType::Int64 => {
                ensure(buf, 5 * 8)?;
                ValueStatistics::Int64(NumericStatistics {
                    min: buf.get_i64(),
                    max: buf.get_i64(),
                    first: buf.get_i64(),
                    last: buf.get_i64(),
                    sum: buf.get_f64(),
                })
            }
            DataType::Float => {
                ensure(buf, 4 * 4 + 8)?;
                ValueStatistics::Float(NumericStatistics {
                    min: buf.get_f32(),
                    max: buf.get_f32(),
                    first: buf.get_f32(),
                    last: buf.get_f32(),
                    sum: buf.get_f64(),
                })
            }
            DataType::Double => {
                ensure(buf, 5 * 8)?;
                ValueStatistics::Double(NumericStatistics {
                    min: buf.get_f64(),
                    max: buf.get_f64(),
                    first: buf.get_f64(),
                    last: buf.get_f64(),
                    sum: buf.get_f64(),
                })
            }
            DataType::Text => {
                let first = get_text(buf)?;
                let last = get_text(buf)?;
                ValueStatistics::Text { first, last }
            }
        };
        Ok(stats)
    }
}

fn get_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::MalformedHeader(format!(
            "invalid boolean byte {other:#04x} in statistics"
        ))),
    }
}

fn get_text<B: Buf>(buf: &mut B) -> Result<Bytes> {
    let len = varint::get_uvarint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| CodecError::MalformedHeader(format!("text length {len} too large")))?;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

/// Count, time range and value summary of a page or chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    data_type: DataType,
    count: u64,
    start_time: i64,
    end_time: i64,
    values: Option<ValueStatistics>,
}

impl Statistics {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            count: 0,
            start_time: i64::MAX,
            end_time: i64::MIN,
            values: None,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Smallest timestamp seen, `None` while empty.
    pub fn start_time(&self) -> Option<i64> {
        (!self.is_empty()).then_some(self.start_time)
    }

    /// Largest timestamp seen, `None` while empty.
    pub fn end_time(&self) -> Option<i64> {
        (!self.is_empty()).then_some(self.end_time)
    }

    pub fn values(&self) -> Option<&ValueStatistics> {
        self.values.as_ref()
    }

    /// Folds one point in. `first` tracks the earliest timestamp and `last`
    /// the latest; ties keep the later write for `last`. Nothing changes when
    /// an error is returned.
    pub fn update(&mut self, timestamp: i64, value: &Value) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(CodecError::TypeMismatch {
                expected: self.data_type,
                found: value.data_type(),
            });
        }
        let count = self.count.checked_add(1).ok_or_else(|| {
            CodecError::ArithmeticOverflow("statistics count exceeds u64".into())
        })?;

        let is_first = timestamp < self.start_time;
        let is_last = timestamp >= self.end_time;
        match &mut self.values {
            Some(values) => values.observe(value, is_first, is_last)?,
            None => self.values = Some(ValueStatistics::new(value)),
        }
        self.start_time = self.start_time.min(timestamp);
        self.end_time = self.end_time.max(timestamp);
        self.count = count;
        Ok(())
    }

    /// Folds another summary of the same column in, e.g. page statistics into
    /// chunk statistics.
    pub fn merge(&mut self, other: &Statistics) -> Result<()> {
        if other.data_type != self.data_type {
            return Err(CodecError::TypeMismatch {
                expected: self.data_type,
                found: other.data_type,
            });
        }
        let Some(other_values) = &other.values else {
            return Ok(());
        };
        let count = self.count.checked_add(other.count).ok_or_else(|| {
            CodecError::ArithmeticOverflow("statistics count exceeds u64".into())
        })?;

        let take_first = other.start_time < self.start_time;
        let take_last = other.end_time >= self.end_time;
        match &mut self.values {
            Some(values) => values.absorb(other_values, take_first, take_last)?,
            None => self.values = Some(other_values.clone()),
        }
        self.start_time = self.start_time.min(other.start_time);
        self.end_time = self.end_time.max(other.end_time);
        self.count = count;
        Ok(())
    }

    /// Layout: `[count: LEB128]`, then for a non-empty summary
    /// `[start time:8][end time:8]` followed by the per-type fields.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        varint::put_uvarint(buf, self.count);
        if let Some(values) = &self.values {
            buf.put_i64(self.start_time);
            buf.put_i64(self.end_time);
            values.serialize(buf);
        }
    }

    pub fn deserialize<B: Buf>(data_type: DataType, buf: &mut B) -> Result<Self> {
        let count = varint::get_uvarint(buf)?;
        if count == 0 {
            return Ok(Self::new(data_type));
        }
        ensure(buf, 16)?;
        let start_time = buf.get_i64();
        let end_time = buf.get_i64();
        if start_time > end_time {
            return Err(CodecError::MalformedHeader(format!(
                "statistics time range {start_time}..{end_time} is inverted"
            )));
        }
        let values = ValueStatistics::deserialize(data_type, buf)?;
        Ok(Self {
            data_type,
            count,
            start_time,
            end_time,
            values: Some(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn collect(data_type: DataType, points: &[(i64, Value)]) -> Statistics {
        let mut stats = Statistics::new(data_type);
        for (t, v) in points {
            stats.update(*t, v).unwrap();
        }
        stats
    }

    #[test]
    fn test_int32_summary() {
        let stats = collect(
            DataType::Int32,
            &[
                (10, Value::Int32(5)),
                (20, Value::Int32(-3)),
                (30, Value::Int32(9)),
                (40, Value::Int32(1)),
            ],
        );
        assert_eq!(stats.count(), 4);
        assert_eq!(stats.start_time(), Some(10));
        assert_eq!(stats.end_time(), Some(40));
        assert_eq!(
            stats.values(),
            Some(&ValueStatistics::Int32(NumericStatistics {
                min: -3,
                max: 9,
                first: 5,
                last: 1,
                sum: 12,
            }))
        );
    }

    #[test]
    fn test_int32_sum_widens() {
        let stats = collect(
            DataType::Int32,
            &[(1, i32::MAX.into()), (2, i32::MAX.into())],
        );
        match stats.values() {
            Some(ValueStatistics::Int32(s)) => assert_eq!(s.sum, 2 * i32::MAX as i64),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_boolean_and_text() {
        let stats = collect(
            DataType::Boolean,
            &[(1, true.into()), (2, false.into()), (3, true.into())],
        );
        assert_eq!(
            stats.values(),
            Some(&ValueStatistics::Boolean {
                first: true,
                last: true,
                sum: 2,
            })
        );

        let stats = collect(DataType::Text, &[(1, "a".into()), (2, "z".into())]);
        assert_eq!(
            stats.values(),
            Some(&ValueStatistics::Text {
                first: Bytes::from_static(b"a"),
                last: Bytes::from_static(b"z"),
            })
        );
    }

    #[test]
    fn test_out_of_order_first_last() {
        let stats = collect(
            DataType::Double,
            &[
                (20, Value::Double(2.0)),
                (10, Value::Double(1.0)),
                (30, Value::Double(3.0)),
                (25, Value::Double(9.0)),
            ],
        );
        match stats.values() {
            Some(ValueStatistics::Double(s)) => {
                assert_eq!(s.first, 1.0);
                assert_eq!(s.last, 3.0);
                assert_eq!(s.max, 9.0);
                assert_eq!(s.sum, 15.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_leaves_state() {
        let mut stats = collect(DataType::Int64, &[(1, 4i64.into())]);
        let before = stats.clone();
        assert!(matches!(
            stats.update(2, &Value::Int32(1)),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert_eq!(stats, before);
    }

    #[test]
    fn test_merge_pages() {
        let mut chunk = Statistics::new(DataType::Float);
        let later = collect(DataType::Float, &[(100, 7.5f32.into()), (200, 0.5f32.into())]);
        let earlier = collect(DataType::Float, &[(10, 3.0f32.into()), (50, 12.0f32.into())]);
        chunk.merge(&later).unwrap();
        chunk.merge(&earlier).unwrap();
        chunk.merge(&Statistics::new(DataType::Float)).unwrap();

        assert_eq!(chunk.count(), 4);
        assert_eq!(chunk.start_time(), Some(10));
        assert_eq!(chunk.end_time(), Some(200));
        assert_eq!(
            chunk.values(),
            Some(&ValueStatistics::Float(NumericStatistics {
                min: 0.5,
                max: 12.0,
                first: 3.0,
                last: 0.5,
                sum: 23.0,
            }))
        );

        let other = Statistics::new(DataType::Double);
        assert!(matches!(
            chunk.merge(&other),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_serialize_layout() {
        let stats = collect(DataType::Int64, &[(1, 10i64.into()), (2, 20i64.into())]);
        let mut buf = BytesMut::new();
        stats.serialize(&mut buf);
        // count + time range + 4 values + sum.
        assert_eq!(buf.len(), 1 + 16 + 40);
        let mut bytes = buf.freeze();
        assert_eq!(Statistics::deserialize(DataType::Int64, &mut bytes).unwrap(), stats);
        assert!(bytes.is_empty());

        let mut buf = BytesMut::new();
        Statistics::new(DataType::Text).serialize(&mut buf);
        assert_eq!(&buf[..], &[0]);
    }

    #[test]
    fn test_deserialize_each_type() {
        let cases = [
            (DataType::Boolean, Value::Boolean(true)),
            (DataType::Int32, Value::Int32(-8)),
            (DataType::Float, Value::Float(2.5)),
            (DataType::Double, Value::Double(-0.125)),
            (DataType::Text, Value::from("hello")),
        ];
        for (data_type, value) in cases {
            let stats = collect(data_type, &[(5, value.clone()), (6, value)]);
            let mut buf = BytesMut::new();
            stats.serialize(&mut buf);
            let restored = Statistics::deserialize(data_type, &mut buf.freeze()).unwrap();
            assert_eq!(restored, stats, "{data_type}");
        }
    }

    #[test]
    fn test_deserialize_truncated() {
        let stats = collect(DataType::Double, &[(1, Value::Double(1.0))]);
        let mut buf = BytesMut::new();
        stats.serialize(&mut buf);
        let mut truncated = buf.freeze().slice(..20);
        assert_eq!(
            Statistics::deserialize(DataType::Double, &mut truncated),
            Err(CodecError::BufferUnderflow)
        );
    }
}
