use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::types::Encoding;

/// Largest run length representable in the 31-bit RLE run field.
pub const MAX_RUN_LENGTH: u32 = i32::MAX as u32;

/// Options recognized by the encoders and the page writer.
///
/// Missing fields take their defaults, so the struct can be embedded in a
/// larger engine config:
///
/// ```
/// let config: tscodec::CodecConfig =
///     serde_json::from_str(r#"{ "fixed_point_scale": 100.0 }"#).unwrap();
/// assert_eq!(config.fixed_point_scale, Some(100.0));
/// assert_eq!(config.time_encoding, "TS_2DIFF");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Upper bound on a single RLE segment.
    pub max_run_length: u32,
    /// Quantization factor for TS_2DIFF on FLOAT/DOUBLE. `None` delta-codes
    /// the raw IEEE-754 bit patterns instead, which is lossless.
    pub fixed_point_scale: Option<f64>,
    /// Encoding of the timestamp stream written next to every value stream.
    pub time_encoding: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_run_length: MAX_RUN_LENGTH,
            fixed_point_scale: None,
            time_encoding: Encoding::Ts2Diff.name().to_string(),
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_run_length == 0 {
            return Err(CodecError::InvalidConfig(
                "max_run_length must be at least 1".into(),
            ));
        }
        if self.max_run_length > MAX_RUN_LENGTH {
            return Err(CodecError::ArithmeticOverflow(format!(
                "max_run_length {} exceeds the 31-bit run field",
                self.max_run_length
            )));
        }
        if let Some(scale) = self.fixed_point_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(CodecError::InvalidConfig(format!(
                    "fixed_point_scale must be finite and positive, got {scale}"
                )));
            }
        }
        self.time_encoding.parse::<Encoding>()?;
        Ok(())
    }

    pub fn with_max_run_length(mut self, max_run_length: u32) -> Self {
        self.max_run_length = max_run_length;
        self
    }

    pub fn with_fixed_point_scale(mut self, scale: f64) -> Self {
        self.fixed_point_scale = Some(scale);
        self
    }

    pub fn with_time_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.time_encoding = encoding.into();
        self
    }
}
