use thiserror::Error;

use crate::types::{DataType, Encoding};

/// Errors raised while creating, driving or reading a codec.
///
/// Every error is local to the encoder, decoder or page that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The requested encoding cannot be applied to the data type.
    #[error("encoding {encoding} is not supported for data type {data_type}")]
    UnsupportedTypeEncoding {
        data_type: DataType,
        encoding: Encoding,
    },

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("unknown compressor: {0}")]
    UnknownCompressor(String),

    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// A decoder tried to read past the end of its page.
    #[error("buffer underflow: page ended before the decoder finished")]
    BufferUnderflow,

    /// A header or block field holds a value outside its legal range.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A run length, delta or quantized value does not fit its field.
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("value of type {found} cannot be written to a {expected} column")]
    TypeMismatch { expected: DataType, found: DataType },

    #[error("encoder already flushed; reset it before reuse")]
    EncoderFlushed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("compression failed: {0}")]
    Compression(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
