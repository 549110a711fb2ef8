//! # tscodec
//!
//! Column encodings for time-series storage: a bit-level writer and reader,
//! five value codecs, a type/encoding compatibility table, and page framing
//! with statistics.
//!
//! ## Encodings
//!
//! | encoding     | idea                                                    | types             |
//! |--------------|---------------------------------------------------------|-------------------|
//! | `PLAIN`      | values verbatim                                         | all               |
//! | `RLE`        | repeated runs plus bit-packed literal groups            | all but TEXT      |
//! | `TS_2DIFF`   | first differences, bit-packed against a block minimum   | numeric           |
//! | `GORILLA`    | XOR with the previous value, leading/trailing-zero window | numeric         |
//! | `GORILLA_V2` | same algorithm, revised framing and byte refill         | numeric           |
//!
//! Regular timestamps under `TS_2DIFF` cost almost nothing once the block
//! header is paid, and slowly changing doubles under `GORILLA` cost a single
//! bit for every repeated reading.
//!
//! ## Example
//!
//! ```rust
//! use tscodec::{create_decoder, create_encoder, CodecConfig, DataType, Value};
//!
//! let config = CodecConfig::default();
//! let mut encoder = create_encoder(DataType::Int32, "RLE", &config).unwrap();
//! for v in [100, 100, 101, 101, 101, 50] {
//!     encoder.encode(&Value::Int32(v)).unwrap();
//! }
//! let mut payload = encoder.flush().unwrap();
//!
//! let mut decoder = create_decoder(DataType::Int32, "RLE").unwrap();
//! let values = decoder.decode_all(&mut payload).unwrap();
//! assert_eq!(values.len(), 6);
//! assert_eq!(values[5], Value::Int32(50));
//! ```
//!
//! ## Pages
//!
//! [`PageWriter`] pairs a timestamp stream with a value stream, keeps
//! [`Statistics`] as it goes and optionally compresses the page body:
//!
//! ```rust
//! # use tscodec::{CodecConfig, DataType, PageReader, PageWriter, Value};
//! let mut writer = PageWriter::new(DataType::Int64, "TS_2DIFF", "SNAPPY", &CodecConfig::default()).unwrap();
//! for i in 0..1_000 {
//!     writer.write(1_700_000_000_000 + i * 1_000, &Value::Int64(i * i)).unwrap();
//! }
//! let bytes = writer.flush().unwrap().to_bytes();
//!
//! for point in PageReader::from_bytes(bytes).unwrap() {
//!     let (timestamp, value) = point.unwrap();
//!     assert!(timestamp >= 1_700_000_000_000);
//!     assert!(matches!(value, Value::Int64(_)));
//! }
//! ```

pub mod bitbuffer;
pub(crate) mod codec;
pub mod compress;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod page;
pub mod statistics;
pub mod types;
pub mod varint;

// Re-export primary types at the crate root.
pub use compress::Compressor;
pub use config::{CodecConfig, MAX_RUN_LENGTH};
pub use decoder::{create_decoder, Decoder, DecoderIter};
pub use encoder::{create_encoder, Encoder};
pub use error::{CodecError, Result};
pub use page::{Page, PageHeader, PageReader, PageWriter};
pub use statistics::{NumericStatistics, Statistics, ValueStatistics};
pub use types::{DataType, Encoding, Value};
