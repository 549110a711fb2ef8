use bytes::Bytes;

use crate::codec::gorilla::{GorillaEncoder, GorillaVersion};
use crate::codec::plain::PlainEncoder;
use crate::codec::rle::RleEncoder;
use crate::codec::ts2diff::Ts2DiffEncoder;
use crate::codec::ValueEncoder;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::types::{DataType, Encoding, Value};

#[derive(Debug)]
enum EncoderState {
    Plain(PlainEncoder),
    Rle(RleEncoder),
    Ts2Diff(Ts2DiffEncoder),
    Gorilla(GorillaEncoder),
}

impl EncoderState {
    fn inner(&mut self) -> &mut dyn ValueEncoder {
        match self {
            EncoderState::Plain(e) => e,
            EncoderState::Rle(e) => e,
            EncoderState::Ts2Diff(e) => e,
            EncoderState::Gorilla(e) => e,
        }
    }
}

/// Column encoder for one data type and one encoding.
///
/// Values are appended with [`encode`](Self::encode) and the page payload is
/// produced by [`flush`](Self::flush). After a flush the encoder refuses
/// further input until [`reset`](Self::reset) is called.
///
/// # Example
/// ```
/// use tscodec::{CodecConfig, DataType, Encoder, Encoding, Value};
///
/// let mut encoder = Encoder::new(DataType::Int32, Encoding::Rle, &CodecConfig::default()).unwrap();
/// for v in [100, 100, 101, 101, 101, 50] {
///     encoder.encode(&Value::Int32(v)).unwrap();
/// }
/// let payload = encoder.flush().unwrap();
/// assert!(!payload.is_empty());
/// ```
#[derive(Debug)]
pub struct Encoder {
    data_type: DataType,
    encoding: Encoding,
    state: EncoderState,
    /// Number of values encoded since the last reset.
    count: u64,
    /// Whether `flush()` has been called.
    flushed: bool,
}

impl Encoder {
    /// Creates an encoder, rejecting illegal type/encoding pairs before any
    /// value is written.
    pub fn new(data_type: DataType, encoding: Encoding, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        data_type.check_encoding(encoding)?;

        let state = match encoding {
            Encoding::Plain => EncoderState::Plain(PlainEncoder::new()),
            Encoding::Rle => {
                EncoderState::Rle(RleEncoder::new(data_type, config.max_run_length)?)
            }
            Encoding::Ts2Diff => EncoderState::Ts2Diff(Ts2DiffEncoder::new(
                data_type,
                config.fixed_point_scale,
            )?),
            Encoding::Gorilla => {
                EncoderState::Gorilla(GorillaEncoder::new(data_type, GorillaVersion::V1)?)
            }
            Encoding::GorillaV2 => {
                EncoderState::Gorilla(GorillaEncoder::new(data_type, GorillaVersion::V2)?)
            }
        };
        tracing::trace!(%data_type, %encoding, "created encoder");

        Ok(Self {
            data_type,
            encoding,
            state,
            count: 0,
            flushed: false,
        })
    }

    /// Appends one value. The value must carry the encoder's data type.
    pub fn encode(&mut self, value: &Value) -> Result<()> {
        if self.flushed {
            return Err(CodecError::EncoderFlushed);
        }
        if value.data_type() != self.data_type {
            return Err(CodecError::TypeMismatch {
                expected: self.data_type,
                found: value.data_type(),
            });
        }
        self.state.inner().encode(value)?;
        self.count += 1;
        Ok(())
    }

    /// Finalizes the payload, padded to a byte boundary.
    pub fn flush(&mut self) -> Result<Bytes> {
        if self.flushed {
            return Err(CodecError::EncoderFlushed);
        }
        let payload = self.state.inner().flush()?;
        self.flushed = true;
        tracing::trace!(
            encoding = %self.encoding,
            values = self.count,
            bytes = payload.len(),
            "flushed encoder"
        );
        Ok(payload)
    }

    /// Clears all running state so the encoder can produce another payload.
    pub fn reset(&mut self) {
        self.state.inner().reset();
        self.count = 0;
        self.flushed = false;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// Parses `encoding_name` and builds an [`Encoder`] for it.
pub fn create_encoder(
    data_type: DataType,
    encoding_name: &str,
    config: &CodecConfig,
) -> Result<Encoder> {
    Encoder::new(data_type, encoding_name.parse()?, config)
}
