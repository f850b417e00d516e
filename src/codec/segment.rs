//! Segment framing and little-endian primitives.
//!
//! Every segment is a 24-byte header followed by `byte_length` payload bytes:
//!
//! ```text
//! tag u32 | version u16 | reserved u16 | element_count u64 | byte_length u64
//! ```

use super::{SegmentTag, SEGMENT_VERSION};
use crate::error::UmbError;

/// Size of a segment header in bytes.
pub const SEGMENT_HEADER_LEN: usize = 24;

/// Parsed segment header.
///
/// The tag is kept raw so that segments written by newer versions can be
/// recognised and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Raw segment tag.
    pub tag: u32,
    /// Segment layout version.
    pub version: u16,
    /// Number of logical records in the payload.
    pub element_count: u64,
    /// Payload length in bytes, header excluded.
    pub byte_length: u64,
}

impl SegmentHeader {
    /// Header for a segment written by this build.
    pub fn new(tag: SegmentTag, element_count: u64, byte_length: u64) -> Self {
        Self {
            tag: tag.code(),
            version: SEGMENT_VERSION,
            element_count,
            byte_length,
        }
    }

    /// Serialize to the fixed 24-byte layout.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_LEN] {
        let mut bytes = [0u8; SEGMENT_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.tag.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        // 6..8 reserved
        bytes[8..16].copy_from_slice(&self.element_count.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.byte_length.to_le_bytes());
        bytes
    }

    /// Parse a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UmbError> {
        if bytes.len() < SEGMENT_HEADER_LEN {
            return Err(UmbError::format(format!(
                "Segment header too short: {} bytes, expected {}",
                bytes.len(),
                SEGMENT_HEADER_LEN
            )));
        }
        let mut r = ByteReader::new(&bytes[..SEGMENT_HEADER_LEN], "segment header");
        let tag = r.u32()?;
        let version = r.u16()?;
        let _reserved = r.u16()?;
        let element_count = r.u64()?;
        let byte_length = r.u64()?;

        if version != SEGMENT_VERSION {
            return Err(UmbError::UnsupportedVersion {
                found: version,
                supported: SEGMENT_VERSION,
            });
        }

        Ok(Self {
            tag,
            version,
            element_count,
            byte_length,
        })
    }

    /// Total segment length: header plus payload.
    pub fn segment_len(&self) -> u64 {
        (SEGMENT_HEADER_LEN as u64).saturating_add(self.byte_length)
    }
}

/// Frame `payload` as a complete segment.
pub fn frame(tag: SegmentTag, element_count: u64, payload: &[u8]) -> Vec<u8> {
    let header = SegmentHeader::new(tag, element_count, payload.len() as u64);
    let mut out = Vec::with_capacity(SEGMENT_HEADER_LEN + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a `u8`.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write a `u16`.
    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a `u32`.
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write an `i64`.
    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write an `f64` (IEEE-754 binary64).
    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a count as `u32`, failing if it does not fit.
    pub fn put_count(&mut self, n: usize, what: &str) -> Result<(), UmbError> {
        let n = u32::try_from(n)
            .map_err(|_| UmbError::format(format!("Too many {what}: {n} exceeds u32 range")))?;
        self.put_u32(n);
        Ok(())
    }

    /// Write a `u32` length prefix followed by the bytes.
    pub fn put_len_prefixed(&mut self, bytes: &[u8], what: &str) -> Result<(), UmbError> {
        self.put_count(bytes.len(), what)?;
        self.put_bytes(bytes);
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and return the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked little-endian reader over one segment payload.
///
/// Running past the end is a format error naming the segment.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    /// Reader over `bytes`; `context` names the segment in error messages.
    pub fn new(bytes: &'a [u8], context: &'static str) -> Self {
        Self {
            bytes,
            pos: 0,
            context,
        }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Take the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], UmbError> {
        if n > self.remaining() {
            return Err(UmbError::format(format!(
                "Truncated {} segment: need {} bytes at offset {}, only {} left",
                self.context,
                n,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], UmbError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a `u8`.
    pub fn u8(&mut self) -> Result<u8, UmbError> {
        Ok(self.array::<1>()?[0])
    }

    /// Read a `u16`.
    pub fn u16(&mut self) -> Result<u16, UmbError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Read a `u32`.
    pub fn u32(&mut self) -> Result<u32, UmbError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Read a `u64`.
    pub fn u64(&mut self) -> Result<u64, UmbError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read an `i64`.
    pub fn i64(&mut self) -> Result<i64, UmbError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    /// Read an `f64`.
    pub fn f64(&mut self) -> Result<f64, UmbError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Read a `u32` count of records that each occupy at least
    /// `min_record_len` bytes, rejecting counts the remaining input cannot
    /// hold. Keeps corrupt counts from driving huge allocations.
    pub fn count(&mut self, min_record_len: usize) -> Result<usize, UmbError> {
        let n = self.u32()? as usize;
        self.ensure_records(n, min_record_len)?;
        Ok(n)
    }

    /// Fail unless `records` records of at least `min_record_len` bytes each
    /// can still fit in the remaining input. Call before sizing a buffer
    /// from a count that came from another segment.
    pub fn ensure_records(&self, records: usize, min_record_len: usize) -> Result<(), UmbError> {
        if records.saturating_mul(min_record_len) > self.remaining() {
            return Err(UmbError::format(format!(
                "Truncated {} segment: {} records at offset {} exceed remaining {} bytes",
                self.context,
                records,
                self.pos,
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Read a `u32`-length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<String, UmbError> {
        let len = self.count(1)?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| {
            UmbError::format(format!("Invalid UTF-8 in {} segment: {e}", self.context))
        })
    }

    /// Fail unless the payload was consumed exactly.
    pub fn finish(self) -> Result<(), UmbError> {
        if self.remaining() != 0 {
            return Err(UmbError::format(format!(
                "Length mismatch in {} segment: {} trailing bytes",
                self.context,
                self.remaining()
            )));
        }
        Ok(())
    }
}
