//! Page framing: a timestamp stream and a value stream, encoded
//! independently, behind a small header and the page statistics.
//!
//! ```text
//! [value encoding:1][data type:1][time encoding:1][compressor:1]
//! [uncompressed body len: LEB128][compressed body len: LEB128][time stream len: LEB128]
//! [statistics]
//! [body = compress(time stream ++ value stream)]
//! ```
//!
//! The point count is the statistics count.

use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::ensure;
use crate::compress::Compressor;
use crate::config::CodecConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, Result};
use crate::statistics::Statistics;
use crate::types::{DataType, Encoding, Value};
use crate::varint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub data_type: DataType,
    pub value_encoding: Encoding,
    pub time_encoding: Encoding,
    pub compressor: Compressor,
    pub uncompressed_len: usize,
    pub compressed_len: usize,
    /// Length of the time stream inside the uncompressed body.
    pub time_len: usize,
}

impl PageHeader {
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.value_encoding.id());
        buf.put_u8(self.data_type.id());
        buf.put_u8(self.time_encoding.id());
        buf.put_u8(self.compressor.id());
        varint::put_uvarint(buf, self.uncompressed_len as u64);
        varint::put_uvarint(buf, self.compressed_len as u64);
        varint::put_uvarint(buf, self.time_len as u64);
    }

    pub fn deserialize<B: Buf>(buf: &mut B) -> Result<Self> {
        ensure(buf, 4)?;
        let value_encoding = Encoding::from_id(buf.get_u8())?;
        let data_type = DataType::from_id(buf.get_u8())?;
        let time_encoding = Encoding::from_id(buf.get_u8())?;
        let compressor = Compressor::from_id(buf.get_u8())?;
        let uncompressed_len = get_len(buf)?;
        let compressed_len = get_len(buf)?;
        let time_len = get_len(buf)?;

        data_type.check_encoding(value_encoding)?;
        DataType::Int64.check_encoding(time_encoding)?;
        if time_len > uncompressed_len {
            return Err(CodecError::MalformedHeader(format!(
                "time stream of {time_len} bytes exceeds page body of {uncompressed_len} bytes"
            )));
        }
        Ok(Self {
            data_type,
            value_encoding,
            time_encoding,
            compressor,
            uncompressed_len,
            compressed_len,
            time_len,
        })
    }
}

fn get_len<B: Buf>(buf: &mut B) -> Result<usize> {
    let len = varint::get_uvarint(buf)?;
    usize::try_from(len)
        .map_err(|_| CodecError::MalformedHeader(format!("length {len} does not fit in memory")))
}

/// An immutable encoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub header: PageHeader,
    pub statistics: Statistics,
    /// Page body, compressed with `header.compressor`.
    pub data: Bytes,
}

impl Page {
    pub fn point_count(&self) -> u64 {
        self.statistics.count()
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 64);
        self.header.serialize(&mut buf);
        self.statistics.serialize(&mut buf);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Reads one page from the front of `buf`, leaving whatever follows it.
    pub fn read_from(buf: &mut Bytes) -> Result<Self> {
        let header = PageHeader::deserialize(buf)?;
        let statistics = Statistics::deserialize(header.data_type, buf)?;
        ensure(buf, header.compressed_len)?;
        let data = buf.split_to(header.compressed_len);
        Ok(Self {
            header,
            statistics,
            data,
        })
    }

    /// Parses a buffer holding exactly one page.
    pub fn from_bytes(mut bytes: Bytes) -> Result<Self> {
        let page = Self::read_from(&mut bytes)?;
        if bytes.has_remaining() {
            return Err(CodecError::MalformedHeader(format!(
                "{} bytes after the page body",
                bytes.remaining()
            )));
        }
        Ok(page)
    }
}

/// Buffers one column's points and cuts them into pages.
///
/// All type, encoding and compressor names are checked by
/// [`new`](Self::new), before any point is written.
///
/// # Example
/// ```
/// use tscodec::{CodecConfig, DataType, PageReader, PageWriter, Value};
///
/// let mut writer = PageWriter::new(DataType::Double, "GORILLA", "SNAPPY", &CodecConfig::default()).unwrap();
/// writer.write(1_000, &Value::Double(20.5)).unwrap();
/// writer.write(2_000, &Value::Double(20.75)).unwrap();
/// let page = writer.flush().unwrap();
///
/// let points = PageReader::new(&page).unwrap().read_all().unwrap();
/// assert_eq!(points, vec![(1_000, Value::Double(20.5)), (2_000, Value::Double(20.75))]);
/// ```
#[derive(Debug)]
pub struct PageWriter {
    data_type: DataType,
    compressor: Compressor,
    time_encoder: Encoder,
    value_encoder: Encoder,
    statistics: Statistics,
}

impl PageWriter {
    pub fn new(
        data_type: DataType,
        value_encoding_name: &str,
        compressor_name: &str,
        config: &CodecConfig,
    ) -> Result<Self> {
        let value_encoding: Encoding = value_encoding_name.parse()?;
        let compressor: Compressor = compressor_name.parse()?;
        let time_encoding: Encoding = config.time_encoding.parse()?;

        let value_encoder = Encoder::new(data_type, value_encoding, config)?;
        let time_encoder = Encoder::new(DataType::Int64, time_encoding, config)?;
        Ok(Self {
            data_type,
            compressor,
            time_encoder,
            value_encoder,
            statistics: Statistics::new(data_type),
        })
    }

    pub fn write(&mut self, timestamp: i64, value: &Value) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(CodecError::TypeMismatch {
                expected: self.data_type,
                found: value.data_type(),
            });
        }
        self.value_encoder.encode(value)?;
        self.time_encoder.encode(&Value::Int64(timestamp))?;
        self.statistics.update(timestamp, value)
    }

    pub fn point_count(&self) -> u64 {
        self.statistics.count()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Closes the current page. The writer starts a fresh page afterwards.
    pub fn flush(&mut self) -> Result<Page> {
        let times = self.time_encoder.flush()?;
        let values = self.value_encoder.flush()?;

        let mut body = BytesMut::with_capacity(times.len() + values.len());
        body.put_slice(&times);
        body.put_slice(&values);
        let data = self.compressor.compress(&body)?;

        let header = PageHeader {
            data_type: self.data_type,
            value_encoding: self.value_encoder.encoding(),
            time_encoding: self.time_encoder.encoding(),
            compressor: self.compressor,
            uncompressed_len: body.len(),
            compressed_len: data.len(),
            time_len: times.len(),
        };
        let statistics = mem::replace(&mut self.statistics, Statistics::new(self.data_type));
        self.time_encoder.reset();
        self.value_encoder.reset();

        tracing::debug!(
            data_type = %header.data_type,
            encoding = %header.value_encoding,
            compressor = %header.compressor,
            points = statistics.count(),
            uncompressed = header.uncompressed_len,
            compressed = header.compressed_len,
            "flushed page"
        );
        Ok(Page {
            header,
            statistics,
            data,
        })
    }
}

/// Reads the points of one page back, in write order.
#[derive(Debug)]
pub struct PageReader {
    statistics: Statistics,
    time_decoder: Decoder,
    value_decoder: Decoder,
    time_stream: Bytes,
    value_stream: Bytes,
    /// Points not yet returned.
    remaining: u64,
    done: bool,
}

impl PageReader {
    pub fn new(page: &Page) -> Result<Self> {
        let header = &page.header;
        let body = header
            .compressor
            .uncompress(&page.data, header.uncompressed_len)?;
        if header.time_len > body.len() {
            return Err(CodecError::MalformedHeader(format!(
                "time stream of {} bytes in a {}-byte body",
                header.time_len,
                body.len()
            )));
        }
        let time_stream = body.slice(..header.time_len);
        let value_stream = body.slice(header.time_len..);

        tracing::debug!(
            data_type = %header.data_type,
            encoding = %header.value_encoding,
            points = page.point_count(),
            bytes = body.len(),
            "opened page"
        );
        Ok(Self {
            statistics: page.statistics.clone(),
            time_decoder: Decoder::new(DataType::Int64, header.time_encoding)?,
            value_decoder: Decoder::new(header.data_type, header.value_encoding)?,
            time_stream,
            value_stream,
            remaining: page.point_count(),
            done: false,
        })
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        Self::new(&Page::from_bytes(bytes)?)
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Returns the next point, or `None` once every counted point was read.
    pub fn next_point(&mut self) -> Result<Option<(i64, Value)>> {
        if self.remaining == 0 {
            let leftover = self.time_stream.remaining() + self.value_stream.remaining();
            if leftover > 0 {
                return Err(CodecError::MalformedHeader(format!(
                    "{leftover} bytes left after the last point"
                )));
            }
            return Ok(None);
        }
        if !self.time_decoder.has_next(&self.time_stream)
            || !self.value_decoder.has_next(&self.value_stream)
        {
            return Err(CodecError::BufferUnderflow);
        }

        let timestamp = match self.time_decoder.next(&mut self.time_stream)? {
            Value::Int64(t) => t,
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: DataType::Int64,
                    found: other.data_type(),
                })
            }
        };
        let value = self.value_decoder.next(&mut self.value_stream)?;
        self.remaining -= 1;
        Ok(Some((timestamp, value)))
    }

    pub fn read_all(self) -> Result<Vec<(i64, Value)>> {
        self.collect()
    }
}

impl Iterator for PageReader {
    type Item = Result<(i64, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_point() {
            Ok(Some(point)) => Some(Ok(point)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
