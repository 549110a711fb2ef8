use bytes::Buf;

use crate::codec::gorilla::{GorillaDecoder, GorillaVersion};
use crate::codec::plain::PlainDecoder;
use crate::codec::rle::RleDecoder;
use crate::codec::ts2diff::Ts2DiffDecoder;
use crate::codec::ValueDecoder;
use crate::error::Result;
use crate::types::{DataType, Encoding, Value};

#[derive(Debug)]
enum DecoderState {
    Plain(PlainDecoder),
    Rle(RleDecoder),
    Ts2Diff(Ts2DiffDecoder),
    Gorilla(GorillaDecoder),
}

/// Column decoder for one data type and one encoding.
///
/// The decoder does not own the page: every call takes the buffer, and the
/// decoder keeps only its running state between calls. Call
/// [`reset`](Self::reset) before pointing it at another page.
///
/// # Example
/// ```
/// use tscodec::{create_decoder, create_encoder, CodecConfig, DataType, Value};
///
/// let mut encoder = create_encoder(DataType::Double, "GORILLA", &CodecConfig::default()).unwrap();
/// for v in [1.5, 1.5, 2.25, 2.25] {
///     encoder.encode(&Value::Double(v)).unwrap();
/// }
/// let mut page = encoder.flush().unwrap();
///
/// let mut decoder = create_decoder(DataType::Double, "GORILLA").unwrap();
/// let values = decoder.decode_all(&mut page).unwrap();
/// assert_eq!(values[2], Value::Double(2.25));
/// ```
#[derive(Debug)]
pub struct Decoder {
    data_type: DataType,
    encoding: Encoding,
    state: DecoderState,
}

impl Decoder {
    pub fn new(data_type: DataType, encoding: Encoding) -> Result<Self> {
        data_type.check_encoding(encoding)?;

        let state = match encoding {
            Encoding::Plain => DecoderState::Plain(PlainDecoder::new(data_type)),
            Encoding::Rle => DecoderState::Rle(RleDecoder::new(data_type)?),
            Encoding::Ts2Diff => DecoderState::Ts2Diff(Ts2DiffDecoder::new(data_type)?),
            Encoding::Gorilla => {
                DecoderState::Gorilla(GorillaDecoder::new(data_type, GorillaVersion::V1)?)
            }
            Encoding::GorillaV2 => {
                DecoderState::Gorilla(GorillaDecoder::new(data_type, GorillaVersion::V2)?)
            }
        };
        tracing::trace!(%data_type, %encoding, "created decoder");

        Ok(Self {
            data_type,
            encoding,
            state,
        })
    }

    /// Whether another value can be read from `buf`.
    pub fn has_next<B: Buf>(&self, buf: &B) -> bool {
        match &self.state {
            DecoderState::Plain(d) => d.has_next(buf),
            DecoderState::Rle(d) => d.has_next(buf),
            DecoderState::Ts2Diff(d) => d.has_next(buf),
            DecoderState::Gorilla(d) => d.has_next(buf),
        }
    }

    /// Reads the next value. Running out of bytes mid-value is
    /// [`BufferUnderflow`](crate::CodecError::BufferUnderflow).
    pub fn next<B: Buf>(&mut self, buf: &mut B) -> Result<Value> {
        match &mut self.state {
            DecoderState::Plain(d) => d.next(buf),
            DecoderState::Rle(d) => d.next(buf),
            DecoderState::Ts2Diff(d) => d.next(buf),
            DecoderState::Gorilla(d) => d.next(buf),
        }
    }

    /// Clears all running state back to a freshly constructed decoder.
    pub fn reset(&mut self) {
        match &mut self.state {
            DecoderState::Plain(d) => d.reset(),
            DecoderState::Rle(d) => d.reset(),
            DecoderState::Ts2Diff(d) => d.reset(),
            DecoderState::Gorilla(d) => d.reset(),
        }
    }

    /// Decodes every remaining value in `buf`.
    pub fn decode_all<B: Buf>(&mut self, buf: &mut B) -> Result<Vec<Value>> {
        self.iter(buf).collect()
    }

    /// Returns an iterator that lazily decodes values from `buf`. It stops
    /// after the first error.
    pub fn iter<'a, B: Buf>(&'a mut self, buf: &'a mut B) -> DecoderIter<'a, B> {
        DecoderIter {
            decoder: self,
            buf,
            done: false,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// Parses `encoding_name` and builds a [`Decoder`] for it.
pub fn create_decoder(data_type: DataType, encoding_name: &str) -> Result<Decoder> {
    Decoder::new(data_type, encoding_name.parse()?)
}

/// Lazy iterator over the values of one page.
pub struct DecoderIter<'a, B: Buf> {
    decoder: &'a mut Decoder,
    buf: &'a mut B,
    done: bool,
}

impl<B: Buf> Iterator for DecoderIter<'_, B> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.decoder.has_next(&*self.buf) {
            return None;
        }
        let result = self.decoder.next(&mut *self.buf);
        self.done = result.is_err();
        Some(result)
    }
}

impl<B: Buf> std::iter::FusedIterator for DecoderIter<'_, B> {}
