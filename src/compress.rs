//! Block compression applied to a whole encoded page body.
//!
//! The codecs never see compressed bytes: a page body is compressed after
//! both streams are flushed and uncompressed before any decoder runs.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{CodecError, Result};

/// Compressor of a page body. The discriminant is the id stored in page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Compressor {
    #[default]
    Uncompressed = 0,
    Snappy = 1,
}

impl Compressor {
    pub const ALL: [Compressor; 2] = [Compressor::Uncompressed, Compressor::Snappy];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| CodecError::MalformedHeader(format!("unknown compressor id {id}")))
    }

    pub fn name(self) -> &'static str {
        match self {
            Compressor::Uncompressed => "UNCOMPRESSED",
            Compressor::Snappy => "SNAPPY",
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Bytes> {
        match self {
            Compressor::Uncompressed => Ok(Bytes::copy_from_slice(data)),
            Compressor::Snappy => {
                let mut encoder = snap::raw::Encoder::new();
                let compressed = encoder
                    .compress_vec(data)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                Ok(Bytes::from(compressed))
            }
        }
    }

    /// Inverts [`compress`](Self::compress). The output must be exactly
    /// `uncompressed_len` bytes long.
    pub fn uncompress(self, data: &[u8], uncompressed_len: usize) -> Result<Bytes> {
        let out = match self {
            Compressor::Uncompressed => Bytes::copy_from_slice(data),
            Compressor::Snappy => {
                let declared = snap::raw::decompress_len(data)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                if declared != uncompressed_len {
                    return Err(CodecError::MalformedHeader(format!(
                        "snappy block expands to {declared} bytes, header says {uncompressed_len}"
                    )));
                }
                let mut decoder = snap::raw::Decoder::new();
                let decompressed = decoder
                    .decompress_vec(data)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                Bytes::from(decompressed)
            }
        };
        if out.len() != uncompressed_len {
            return Err(CodecError::MalformedHeader(format!(
                "page body is {} bytes, header says {uncompressed_len}",
                out.len()
            )));
        }
        Ok(out)
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compressor {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                tracing::debug!(compressor = s, "rejecting unknown compressor");
                CodecError::UnknownCompressor(s.to_string())
            })
    }
}
