//! UMB codec: byte-exact translation between an [`AtsModel`] and an archive.
//!
//! ## Layout
//!
//! ```text
//! container header (24 bytes) → compressed body
//! body = manifest segment → states → transitions → annotations → metadata
//!        [→ attributes]
//! ```
//!
//! The manifest records offset, length, element count and an xxh64 checksum
//! for every data segment. Decode checks all of them before any model data
//! is interpreted and never returns a partial model.
//!
//! ## Determinism Guarantees
//!
//! - Same model + same config → identical bytes
//! - `encode(decode(encode(m))) == encode(m)`
//! - No timestamps and no map iteration order in the output

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::CodecConfig;
use crate::error::UmbError;
use crate::types::model::ModelParts;
use crate::types::{AtsModel, StateAttributes, TimeType};

pub mod container;
pub mod manifest;
pub mod segment;

mod annotations;
mod attributes;
mod metadata;
mod states;
mod transitions;

pub use container::{ContainerHeader, CONTAINER_HEADER_LEN};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_ENTRY_LEN};
pub use segment::{SegmentHeader, SEGMENT_HEADER_LEN};

use manifest::EncodedSegment;

/// Archive magic bytes.
pub const MAGIC: [u8; 4] = *b"UMBF";

/// Major format version. Archives with another major version are rejected.
pub const FORMAT_VERSION_MAJOR: u16 = 1;

/// Minor format version. Newer minors are accepted.
pub const FORMAT_VERSION_MINOR: u16 = 0;

/// Layout version written in every segment header.
pub const SEGMENT_VERSION: u16 = 1;

/// Kind of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentTag {
    /// Table of contents.
    Manifest,
    /// State count and initial states.
    States,
    /// Choices and branches.
    Transitions,
    /// Label pool and label references.
    Annotations,
    /// Time type and model info.
    Metadata,
    /// Players, Markovian flags and exit rates.
    Attributes,
}

impl SegmentTag {
    /// Wire code.
    pub fn code(self) -> u32 {
        match self {
            Self::Manifest => 0,
            Self::States => 1,
            Self::Transitions => 2,
            Self::Annotations => 3,
            Self::Metadata => 4,
            Self::Attributes => 5,
        }
    }

    /// Tag for a wire code, `None` for codes this build does not know.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Manifest),
            1 => Some(Self::States),
            2 => Some(Self::Transitions),
            3 => Some(Self::Annotations),
            4 => Some(Self::Metadata),
            5 => Some(Self::Attributes),
            _ => None,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::States => "states",
            Self::Transitions => "transitions",
            Self::Annotations => "annotations",
            Self::Metadata => "metadata",
            Self::Attributes => "attributes",
        }
    }
}

impl fmt::Display for SegmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Encode
// ============================================================================

/// Encode with the default configuration.
pub fn encode(model: &AtsModel) -> Result<Vec<u8>, UmbError> {
    encode_with(model, &CodecConfig::default())
}

/// Encode `model` into archive bytes.
pub fn encode_with(model: &AtsModel, config: &CodecConfig) -> Result<Vec<u8>, UmbError> {
    config.check()?;
    let body = encode_body(model)?;
    let archive = container::pack(&body, config.compression)?;
    tracing::debug!(
        states = model.num_states(),
        choices = model.num_choices(),
        body_bytes = body.len(),
        archive_bytes = archive.len(),
        "Encoded UMB archive"
    );
    Ok(archive)
}

/// Uncompressed body: manifest followed by every data segment.
pub fn encode_body(model: &AtsModel) -> Result<Vec<u8>, UmbError> {
    let (states_payload, states_count) = states::encode(model)?;
    let (transitions_payload, transitions_count) = transitions::encode(model.transitions())?;
    let (annotations_payload, annotations_count) = annotations::encode(
        model.annotations(),
        model.state_label_refs(),
        model.choice_label_refs(),
    )?;
    let (metadata_payload, metadata_count) = metadata::encode(model.time(), model.info())?;

    let mut segments = vec![
        EncodedSegment {
            tag: SegmentTag::States,
            element_count: states_count,
            payload: states_payload,
        },
        EncodedSegment {
            tag: SegmentTag::Transitions,
            element_count: transitions_count,
            payload: transitions_payload,
        },
        EncodedSegment {
            tag: SegmentTag::Annotations,
            element_count: annotations_count,
            payload: annotations_payload,
        },
        EncodedSegment {
            tag: SegmentTag::Metadata,
            element_count: metadata_count,
            payload: metadata_payload,
        },
    ];
    if !model.attributes().is_empty() {
        let (payload, element_count) = attributes::encode(model.attributes(), model.num_states());
        segments.push(EncodedSegment {
            tag: SegmentTag::Attributes,
            element_count,
            payload,
        });
    }
    manifest::assemble(&segments)
}

/// Encode and write to `writer`.
pub fn write_to<W: Write>(model: &AtsModel, writer: W, config: &CodecConfig) -> Result<(), UmbError> {
    let bytes = encode_with(model, config)?;
    let mut writer = BufWriter::new(writer);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Encode with the default configuration and write to `path`.
pub fn write_file(model: &AtsModel, path: impl AsRef<Path>) -> Result<(), UmbError> {
    write_file_with(model, path, &CodecConfig::default())
}

/// Encode and write to `path`. Nothing is created if encoding fails.
pub fn write_file_with(
    model: &AtsModel,
    path: impl AsRef<Path>,
    config: &CodecConfig,
) -> Result<(), UmbError> {
    let bytes = encode_with(model, config)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

// ============================================================================
// Decode
// ============================================================================

/// Decode with the default configuration.
pub fn decode(bytes: &[u8]) -> Result<AtsModel, UmbError> {
    decode_with(bytes, &CodecConfig::default())
}

/// Decode archive bytes into a fresh model.
pub fn decode_with(bytes: &[u8], config: &CodecConfig) -> Result<AtsModel, UmbError> {
    config.check()?;
    let body = container::unpack(bytes, config)?;
    let model = decode_body(&body, config)?;
    tracing::debug!(
        states = model.num_states(),
        choices = model.num_choices(),
        labels = model.annotations().len(),
        archive_bytes = bytes.len(),
        "Decoded UMB archive"
    );
    Ok(model)
}

/// Decode an uncompressed body.
pub fn decode_body(body: &[u8], config: &CodecConfig) -> Result<AtsModel, UmbError> {
    let manifest = Manifest::parse(body)?;
    let payloads = manifest.locate(body, config.verify_checksums)?;

    let mut states_seg = None;
    let mut transitions_seg = None;
    let mut annotations_seg = None;
    let mut metadata_seg = None;
    let mut attributes_seg = None;

    for (entry, payload) in manifest.entries.iter().zip(payloads) {
        let slot = match SegmentTag::from_code(entry.tag) {
            Some(SegmentTag::States) => &mut states_seg,
            Some(SegmentTag::Transitions) => &mut transitions_seg,
            Some(SegmentTag::Annotations) => &mut annotations_seg,
            Some(SegmentTag::Metadata) => &mut metadata_seg,
            Some(SegmentTag::Attributes) => &mut attributes_seg,
            Some(SegmentTag::Manifest) => {
                return Err(UmbError::format("Manifest lists a second manifest segment"));
            }
            None => {
                tracing::warn!(
                    tag = entry.tag,
                    bytes = entry.length,
                    "Skipping unknown segment"
                );
                continue;
            }
        };
        if slot.replace((payload, entry.element_count)).is_some() {
            return Err(UmbError::format(format!(
                "Segment tag {} appears more than once",
                entry.tag
            )));
        }
    }

    let (states_payload, states_count) = required(states_seg, SegmentTag::States)?;
    let (transitions_payload, transitions_count) =
        required(transitions_seg, SegmentTag::Transitions)?;
    let (annotations_payload, annotations_count) =
        required(annotations_seg, SegmentTag::Annotations)?;

    let (num_states, initial_states) = states::decode(states_payload, states_count)?;
    let table = transitions::decode(
        transitions_payload,
        transitions_count,
        num_states,
        config.probability_tolerance,
    )?;
    let (store, state_labels, choice_labels) = annotations::decode(
        annotations_payload,
        annotations_count,
        table.num_states(),
        table.num_choices(),
    )?;
    let (time, info) = match metadata_seg {
        Some((payload, count)) => metadata::decode(payload, count)?,
        None => (TimeType::default(), None),
    };
    let attrs = match attributes_seg {
        Some((payload, count)) => attributes::decode(payload, count, table.num_states())?,
        None => StateAttributes::default(),
    };

    Ok(AtsModel::from_parts(ModelParts {
        initial_states,
        transitions: table,
        annotations: store,
        state_labels,
        choice_labels,
        attributes: attrs,
        time,
        info,
    }))
}

fn required<T>(segment: Option<T>, tag: SegmentTag) -> Result<T, UmbError> {
    segment.ok_or_else(|| UmbError::format(format!("Missing required {tag} segment")))
}

/// Read all of `reader` and decode it.
pub fn read_from<R: Read>(reader: R, config: &CodecConfig) -> Result<AtsModel, UmbError> {
    let mut bytes = Vec::new();
    BufReader::new(reader).read_to_end(&mut bytes)?;
    decode_with(&bytes, config)
}

/// Decode the archive at `path` with the default configuration.
pub fn read_file(path: impl AsRef<Path>) -> Result<AtsModel, UmbError> {
    read_file_with(path, &CodecConfig::default())
}

/// Decode the archive at `path`. The file is closed before returning.
pub fn read_file_with(path: impl AsRef<Path>, config: &CodecConfig) -> Result<AtsModel, UmbError> {
    let file = File::open(path.as_ref())?;
    read_from(file, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Compression;
    use crate::error::ErrorKind;
    use crate::types::{Distribution, Label};

    fn model() -> AtsModel {
        let mut m = AtsModel::new(3);
        m.add_choice(0, Distribution::new([(1, 0.5), (2, 0.5)]).unwrap()).unwrap();
        m.add_choice(1, Distribution::dirac(2)).unwrap();
        m.set_initial_states(vec![0]).unwrap();
        m.label_state(2, Label::new("goal")).unwrap();
        m.label_choice(0, Label::action("flip")).unwrap();
        m
    }

    #[test]
    fn test_tag_codes() {
        for code in 0..6 {
            assert_eq!(SegmentTag::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SegmentTag::from_code(99), None);
        assert_eq!(SegmentTag::Annotations.to_string(), "annotations");
    }

    #[test]
    fn test_body_segment_order() {
        let body = encode_body(&model()).unwrap();
        let manifest = Manifest::parse(&body).unwrap();
        let tags: Vec<u32> = manifest.entries.iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        let config = CodecConfig::default().with_compression(Compression::None);
        let bytes = encode_with(&model(), &config).unwrap();
        assert_eq!(bytes[8], 0);
        assert_eq!(decode_with(&bytes, &config).unwrap(), model());
    }

    #[test]
    fn test_unknown_segment_skipped() {
        let m = model();
        let body = encode_body(&m).unwrap();
        let mut manifest = Manifest::parse(&body).unwrap();
        let data = &body[Manifest::segment_len(manifest.entries.len())..];

        // One more manifest entry shifts every data segment by one entry.
        let future = b"future";
        for entry in &mut manifest.entries {
            entry.offset += MANIFEST_ENTRY_LEN as u64;
        }
        manifest.entries.push(ManifestEntry {
            tag: 42,
            offset: (body.len() + MANIFEST_ENTRY_LEN) as u64,
            length: (SEGMENT_HEADER_LEN + future.len()) as u64,
            element_count: 0,
            checksum: crate::canonical::checksum(future),
        });
        let mut unknown = SegmentHeader::new(SegmentTag::Metadata, 0, future.len() as u64);
        unknown.tag = 42;

        let mut extended = manifest.to_segment().unwrap();
        extended.extend_from_slice(data);
        extended.extend_from_slice(&unknown.to_bytes());
        extended.extend_from_slice(future);

        assert_eq!(decode_body(&extended, &CodecConfig::default()).unwrap(), m);
    }

    #[test]
    fn test_missing_segment() {
        let body = manifest::assemble(&[]).unwrap();
        let err = decode_body(&body, &CodecConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("states"));
    }

    #[test]
    fn test_huge_state_count_is_format_error() {
        let mut states = Vec::new();
        states.extend_from_slice(&u32::MAX.to_le_bytes());
        states.extend_from_slice(&0u32.to_le_bytes());
        let body = manifest::assemble(&[
            EncodedSegment {
                tag: SegmentTag::States,
                element_count: u32::MAX as u64,
                payload: states,
            },
            EncodedSegment {
                tag: SegmentTag::Transitions,
                element_count: u32::MAX as u64,
                payload: Vec::new(),
            },
            EncodedSegment {
                tag: SegmentTag::Annotations,
                element_count: 0,
                payload: Vec::new(),
            },
        ])
        .unwrap();
        let archive = container::pack(&body, Compression::None).unwrap();
        let err = decode(&archive).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_attributes_segment_only_when_recorded() {
        let plain = encode_body(&model()).unwrap();
        assert_eq!(Manifest::parse(&plain).unwrap().entries.len(), 4);

        let mut m = model();
        m.set_time(TimeType::Stochastic);
        m.set_markovian_states(Some(vec![0, 1])).unwrap();
        m.set_exit_rates(Some(vec![2.0, 0.5, 0.0])).unwrap();
        m.set_players(2, Some(vec![0, 1, 0])).unwrap();
        let body = encode_body(&m).unwrap();
        let tags: Vec<u32> = Manifest::parse(&body).unwrap().entries.iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![1, 2, 3, 4, 5]);

        let decoded = decode_body(&body, &CodecConfig::default()).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(decoded.exit_rate(1).unwrap(), Some(0.5));
        assert_eq!(encode_body(&decoded).unwrap(), body);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CodecConfig::default().with_compression(Compression::Zstd { level: 0 });
        assert!(encode_with(&model(), &config).is_err());
    }
}
