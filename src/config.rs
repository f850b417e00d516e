//! Codec configuration.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! The configuration fingerprint quantizes floats to integers before
//! hashing (multiply by 1e6 and round to i64), so the same settings always
//! produce the same fingerprint regardless of float formatting.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::error::UmbError;

/// Allowed deviation of a choice's probability mass from 1.0.
pub const DEFAULT_PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Zstd level used when nothing else is configured.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Upper bound on the uncompressed archive body (1 GiB).
pub const DEFAULT_MAX_UNCOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Compression applied to the archive body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Compression {
    /// Store the body as-is.
    None,
    /// Zstd at the given level.
    Zstd {
        /// Zstd compression level (1-22).
        level: i32,
    },
}

impl Compression {
    /// Wire code stored in the container header.
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zstd { .. } => 1,
        }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::Zstd {
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Settings shared by the encoder, the decoder and distribution validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Allowed |sum - 1.0| for the probabilities of one choice.
    pub probability_tolerance: f64,
    /// Compression used when encoding.
    pub compression: Compression,
    /// Whether decode verifies per-segment checksums.
    pub verify_checksums: bool,
    /// Largest uncompressed body decode will accept.
    pub max_uncompressed_size: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            probability_tolerance: DEFAULT_PROBABILITY_TOLERANCE,
            compression: Compression::default(),
            verify_checksums: true,
            max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
        }
    }
}

/// Quantized configuration for deterministic hashing.
#[derive(Serialize)]
struct QuantizedCodecConfig {
    probability_tolerance: i64,
    compression: Compression,
    verify_checksums: bool,
    max_uncompressed_size: u64,
}

impl CodecConfig {
    /// Set the probability tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.probability_tolerance = tolerance;
        self
    }

    /// Set the compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Skip checksum verification on decode.
    pub fn without_checksums(mut self) -> Self {
        self.verify_checksums = false;
        self
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, UmbError> {
        let config: Self = serde_json::from_slice(bytes)
            .map_err(|e| UmbError::format(format!("Invalid codec config: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables.
    ///
    /// - `UMB_PROBABILITY_TOLERANCE`: float
    /// - `UMB_COMPRESSION_LEVEL`: zstd level, `0` stores uncompressed
    /// - `UMB_VERIFY_CHECKSUMS`: `true`/`false`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(tolerance) = env_parse::<f64>("UMB_PROBABILITY_TOLERANCE") {
            if tolerance.is_finite() && tolerance >= 0.0 {
                config.probability_tolerance = tolerance;
            }
        }
        if let Some(level) = env_parse::<i32>("UMB_COMPRESSION_LEVEL") {
            config.compression = if level == 0 {
                Compression::None
            } else {
                Compression::Zstd { level }
            };
        }
        if let Some(verify) = env_parse::<bool>("UMB_VERIFY_CHECKSUMS") {
            config.verify_checksums = verify;
        }

        config
    }

    /// Reject settings that cannot work.
    pub fn check(&self) -> Result<(), UmbError> {
        if !self.probability_tolerance.is_finite() || self.probability_tolerance < 0.0 {
            return Err(UmbError::format(format!(
                "probability_tolerance must be a non-negative finite number, got {}",
                self.probability_tolerance
            )));
        }
        if let Compression::Zstd { level } = self.compression {
            if !(1..=22).contains(&level) {
                return Err(UmbError::format(format!(
                    "zstd level must be in 1..=22, got {level}"
                )));
            }
        }
        Ok(())
    }

    /// Stable hex fingerprint of these settings.
    pub fn fingerprint(&self) -> String {
        let quantized = QuantizedCodecConfig {
            probability_tolerance: quantize_float(self.probability_tolerance),
            compression: self.compression,
            verify_checksums: self.verify_checksums,
            max_uncompressed_size: self.max_uncompressed_size,
        };
        // Serializing a plain struct of integers and enums cannot fail.
        canonical_hash_hex(&quantized).unwrap_or_default()
    }
}

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.probability_tolerance, 1e-6);
        assert_eq!(config.compression, Compression::Zstd { level: 3 });
        assert!(config.verify_checksums);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_fingerprint_determinism() {
        assert_eq!(
            CodecConfig::default().fingerprint(),
            CodecConfig::default().fingerprint()
        );
    }

    #[test]
    fn test_fingerprint_changes() {
        let a = CodecConfig::default();
        let b = CodecConfig::default().with_tolerance(1e-3);
        let c = CodecConfig::default().with_compression(Compression::None);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_from_json_partial() {
        let config = CodecConfig::from_json_slice(
            br#"{"probability_tolerance": 0.001, "compression": {"kind": "none"}}"#,
        )
        .unwrap();
        assert_eq!(config.probability_tolerance, 0.001);
        assert_eq!(config.compression, Compression::None);
        assert!(config.verify_checksums);
    }

    #[test]
    fn test_from_json_rejects_bad_level() {
        let err = CodecConfig::from_json_slice(br#"{"compression": {"kind": "zstd", "level": 99}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("zstd level"));
    }
}
