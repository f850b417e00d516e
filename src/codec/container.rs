//! Outer container: fixed header plus (optionally compressed) body.
//!
//! ```text
//! magic "UMBF" | major u16 | minor u16 | compression u8 | reserved [u8; 7] |
//! raw_length u64 | body
//! ```

use std::io::Read;

use super::{FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR, MAGIC};
use crate::config::{CodecConfig, Compression};
use crate::error::UmbError;

/// Size of the container header in bytes.
pub const CONTAINER_HEADER_LEN: usize = 24;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Format major version.
    pub major: u16,
    /// Format minor version.
    pub minor: u16,
    /// Compression code (0 = none, 1 = zstd).
    pub compression: u8,
    /// Length of the body after decompression.
    pub raw_length: u64,
}

impl ContainerHeader {
    /// Serialize to the fixed 24-byte layout.
    pub fn to_bytes(&self) -> [u8; CONTAINER_HEADER_LEN] {
        let mut bytes = [0u8; CONTAINER_HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..6].copy_from_slice(&self.major.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.minor.to_le_bytes());
        bytes[8] = self.compression;
        // 9..16 reserved
        bytes[16..24].copy_from_slice(&self.raw_length.to_le_bytes());
        bytes
    }

    /// Parse and version-check a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UmbError> {
        if bytes.len() < CONTAINER_HEADER_LEN {
            return Err(UmbError::format(format!(
                "Archive too short: {} bytes, expected at least {}",
                bytes.len(),
                CONTAINER_HEADER_LEN
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(UmbError::format(format!(
                "Invalid magic number: {:02X}{:02X}{:02X}{:02X}, expected UMBF",
                bytes[0], bytes[1], bytes[2], bytes[3]
            )));
        }

        let major = u16::from_le_bytes([bytes[4], bytes[5]]);
        if major != FORMAT_VERSION_MAJOR {
            return Err(UmbError::UnsupportedVersion {
                found: major,
                supported: FORMAT_VERSION_MAJOR,
            });
        }
        let minor = u16::from_le_bytes([bytes[6], bytes[7]]);
        let mut raw_length = [0u8; 8];
        raw_length.copy_from_slice(&bytes[16..24]);

        Ok(Self {
            major,
            minor,
            compression: bytes[8],
            raw_length: u64::from_le_bytes(raw_length),
        })
    }
}

/// Wrap `body` in a container, compressing as requested.
pub fn pack(body: &[u8], compression: Compression) -> Result<Vec<u8>, UmbError> {
    let header = ContainerHeader {
        major: FORMAT_VERSION_MAJOR,
        minor: FORMAT_VERSION_MINOR,
        compression: compression.code(),
        raw_length: body.len() as u64,
    };

    let mut out = header.to_bytes().to_vec();
    match compression {
        Compression::None => out.extend_from_slice(body),
        Compression::Zstd { level } => {
            let compressed = zstd::encode_all(body, level)?;
            out.extend_from_slice(&compressed);
        }
    }
    Ok(out)
}

/// Strip the container and return the raw body.
pub fn unpack(bytes: &[u8], config: &CodecConfig) -> Result<Vec<u8>, UmbError> {
    let header = ContainerHeader::from_bytes(bytes)?;
    if header.raw_length > config.max_uncompressed_size {
        return Err(UmbError::format(format!(
            "Body of {} bytes exceeds the {} byte limit",
            header.raw_length, config.max_uncompressed_size
        )));
    }

    let data = &bytes[CONTAINER_HEADER_LEN..];
    let body = match header.compression {
        0 => data.to_vec(),
        1 => inflate(data, header.raw_length)?,
        other => {
            return Err(UmbError::format(format!("Unknown compression code {other}")));
        }
    };

    if body.len() as u64 != header.raw_length {
        return Err(UmbError::format(format!(
            "Length mismatch: header declares {} body bytes, found {}",
            header.raw_length,
            body.len()
        )));
    }
    Ok(body)
}

/// Stream-decompress a zstd body. The buffer grows with the data actually
/// produced; reading stops one byte past `raw_length` so an oversized
/// stream shows up as a length mismatch.
fn inflate(data: &[u8], raw_length: u64) -> Result<Vec<u8>, UmbError> {
    let zstd_error = |e: std::io::Error| UmbError::format(format!("Zstd decompression failed: {e}"));
    let decoder = zstd::stream::read::Decoder::with_buffer(data).map_err(zstd_error)?;
    let mut body = Vec::new();
    decoder
        .take(raw_length.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(zstd_error)?;
    Ok(body)
}
