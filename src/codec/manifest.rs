//! The manifest: table of contents of the archive body.
//!
//! The manifest segment always sits at offset 0 of the body. Its entries
//! describe every data segment that follows, in order, with no gaps:
//!
//! ```text
//! major u16 | minor u16 | segment_count u32
//! segment_count × (tag u32 | reserved u32 | offset u64 | length u64 |
//!                  element_count u64 | checksum u64)
//! ```
//!
//! `offset` and `length` cover header plus payload and are relative to the
//! body start. `checksum` is the xxh64 of the payload alone.

use super::segment::{frame, ByteReader, ByteWriter, SegmentHeader, SEGMENT_HEADER_LEN};
use super::{SegmentTag, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR};
use crate::canonical::checksum;
use crate::error::UmbError;

/// Size of one manifest entry in bytes.
pub const MANIFEST_ENTRY_LEN: usize = 40;

const MANIFEST_PREAMBLE_LEN: usize = 8;

/// One data segment as recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Raw segment tag.
    pub tag: u32,
    /// Start of the segment (header included) within the body.
    pub offset: u64,
    /// Segment length, header included.
    pub length: u64,
    /// Number of records, repeated from the segment header.
    pub element_count: u64,
    /// xxh64 of the segment payload.
    pub checksum: u64,
}

/// Parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Format major version.
    pub major: u16,
    /// Format minor version.
    pub minor: u16,
    /// Data segments in body order.
    pub entries: Vec<ManifestEntry>,
}

/// A data segment ready to be laid out behind the manifest.
pub(crate) struct EncodedSegment {
    pub tag: SegmentTag,
    pub element_count: u64,
    pub payload: Vec<u8>,
}

impl Manifest {
    /// Encoded length of a manifest segment with `n` entries.
    pub fn segment_len(n: usize) -> usize {
        SEGMENT_HEADER_LEN + MANIFEST_PREAMBLE_LEN + n * MANIFEST_ENTRY_LEN
    }

    /// Frame this manifest as the leading body segment.
    pub(crate) fn to_segment(&self) -> Result<Vec<u8>, UmbError> {
        Ok(frame(SegmentTag::Manifest, self.entries.len() as u64, &self.payload()?))
    }

    fn payload(&self) -> Result<Vec<u8>, UmbError> {
        let mut w = ByteWriter::new();
        w.put_u16(self.major);
        w.put_u16(self.minor);
        w.put_count(self.entries.len(), "segments")?;
        for entry in &self.entries {
            w.put_u32(entry.tag);
            w.put_u32(0);
            w.put_u64(entry.offset);
            w.put_u64(entry.length);
            w.put_u64(entry.element_count);
            w.put_u64(entry.checksum);
        }
        Ok(w.into_inner())
    }

    /// Decode the manifest segment at the start of `body`.
    pub fn parse(body: &[u8]) -> Result<Self, UmbError> {
        let header = SegmentHeader::from_bytes(body)?;
        if header.tag != SegmentTag::Manifest.code() {
            return Err(UmbError::format(format!(
                "Body must start with the manifest segment, found tag {}",
                header.tag
            )));
        }
        let end = header.segment_len();
        if end > body.len() as u64 {
            return Err(UmbError::format(format!(
                "Truncated manifest: declares {} bytes, body has {}",
                end,
                body.len()
            )));
        }

        let payload = &body[SEGMENT_HEADER_LEN..end as usize];
        let mut r = ByteReader::new(payload, "manifest");
        let major = r.u16()?;
        let minor = r.u16()?;
        if major != FORMAT_VERSION_MAJOR {
            return Err(UmbError::UnsupportedVersion {
                found: major,
                supported: FORMAT_VERSION_MAJOR,
            });
        }

        let n = r.count(MANIFEST_ENTRY_LEN)?;
        if n as u64 != header.element_count {
            return Err(UmbError::format(format!(
                "Manifest header counts {} segments, payload lists {}",
                header.element_count, n
            )));
        }
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let tag = r.u32()?;
            let _reserved = r.u32()?;
            entries.push(ManifestEntry {
                tag,
                offset: r.u64()?,
                length: r.u64()?,
                element_count: r.u64()?,
                checksum: r.u64()?,
            });
        }
        r.finish()?;

        Ok(Self {
            major,
            minor,
            entries,
        })
    }

    /// Check that the entries tile `body` exactly after the manifest, and
    /// that each segment header agrees with its entry.
    ///
    /// Returns the payload slice of every entry, in order.
    pub fn locate<'a>(
        &self,
        body: &'a [u8],
        verify_checksums: bool,
    ) -> Result<Vec<&'a [u8]>, UmbError> {
        let mut cursor = Self::segment_len(self.entries.len()) as u64;
        let mut payloads = Vec::with_capacity(self.entries.len());

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.offset != cursor {
                return Err(UmbError::format(format!(
                    "Manifest entry {i} starts at {}, expected {cursor}",
                    entry.offset
                )));
            }
            let end = entry.offset.checked_add(entry.length).filter(|&e| e <= body.len() as u64);
            let Some(end) = end else {
                return Err(UmbError::format(format!(
                    "Manifest entry {i} ({} bytes at {}) extends past the body ({} bytes)",
                    entry.length,
                    entry.offset,
                    body.len()
                )));
            };

            let segment = &body[entry.offset as usize..end as usize];
            let header = SegmentHeader::from_bytes(segment)?;
            if header.tag != entry.tag {
                return Err(UmbError::format(format!(
                    "Manifest entry {i} has tag {}, segment header says {}",
                    entry.tag, header.tag
                )));
            }
            if header.segment_len() != entry.length {
                return Err(UmbError::format(format!(
                    "Length mismatch for segment {i}: manifest says {}, header says {}",
                    entry.length,
                    header.segment_len()
                )));
            }
            if header.element_count != entry.element_count {
                return Err(UmbError::format(format!(
                    "Element count mismatch for segment {i}: manifest says {}, header says {}",
                    entry.element_count, header.element_count
                )));
            }

            let payload = &segment[SEGMENT_HEADER_LEN..];
            if verify_checksums {
                let actual = checksum(payload);
                if actual != entry.checksum {
                    return Err(UmbError::format(format!(
                        "Checksum mismatch for segment {i}: expected {:016x}, got {actual:016x}",
                        entry.checksum
                    )));
                }
            }

            payloads.push(payload);
            cursor = end;
        }

        if cursor != body.len() as u64 {
            return Err(UmbError::format(format!(
                "{} trailing bytes after the last segment",
                body.len() as u64 - cursor
            )));
        }
        Ok(payloads)
    }
}

/// Lay out the manifest and `segments` into one body.
pub(crate) fn assemble(segments: &[EncodedSegment]) -> Result<Vec<u8>, UmbError> {
    let mut offset = Manifest::segment_len(segments.len()) as u64;
    let mut entries = Vec::with_capacity(segments.len());
    for segment in segments {
        let length = (SEGMENT_HEADER_LEN + segment.payload.len()) as u64;
        entries.push(ManifestEntry {
            tag: segment.tag.code(),
            offset,
            length,
            element_count: segment.element_count,
            checksum: checksum(&segment.payload),
        });
        offset += length;
    }

    let manifest = Manifest {
        major: FORMAT_VERSION_MAJOR,
        minor: FORMAT_VERSION_MINOR,
        entries,
    };
    let mut body = manifest.to_segment()?;
    body.reserve(offset as usize - body.len());
    for segment in segments {
        body.extend_from_slice(&frame(segment.tag, segment.element_count, &segment.payload));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> Vec<u8> {
        assemble(&[
            EncodedSegment {
                tag: SegmentTag::States,
                element_count: 3,
                payload: vec![1, 2, 3, 4],
            },
            EncodedSegment {
                tag: SegmentTag::Metadata,
                element_count: 1,
                payload: b"{}".to_vec(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_assemble_then_locate() {
        let body = body();
        let manifest = Manifest::parse(&body).unwrap();
        assert_eq!(manifest.major, FORMAT_VERSION_MAJOR);
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].offset, Manifest::segment_len(2) as u64);

        let payloads = manifest.locate(&body, true).unwrap();
        assert_eq!(payloads[0], &[1, 2, 3, 4]);
        assert_eq!(payloads[1], b"{}");
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut body = body();
        let last = body.len() - 1;
        body[last] ^= 0xff;
        let manifest = Manifest::parse(&body).unwrap();
        let err = manifest.locate(&body, true).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
        assert!(manifest.locate(&body, false).is_ok());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut body = body();
        body.push(0);
        let manifest = Manifest::parse(&body).unwrap();
        assert!(manifest.locate(&body, true).is_err());
    }

    #[test]
    fn test_truncated_body_rejected() {
        let body = body();
        let cut = &body[..body.len() - 1];
        let manifest = Manifest::parse(cut).unwrap();
        assert!(manifest.locate(cut, true).is_err());
    }

    #[test]
    fn test_unsupported_major() {
        let mut body = body();
        // Major version is the first field of the manifest payload.
        body[SEGMENT_HEADER_LEN] = 2;
        assert!(matches!(
            Manifest::parse(&body),
            Err(UmbError::UnsupportedVersion { found: 2, .. })
        ));
    }
}
