//! # umb-kernel
//!
//! Annotated transition systems and the Unified Markov Binary (UMB) format.
//!
//! The kernel does three things:
//!
//! 1. Hold an [`AtsModel`] in memory: states, initial states, per-state
//!    nondeterministic choices over probability distributions, and
//!    interned labels on states and choices
//! 2. Encode and decode that model to and from a compressed UMB archive,
//!    validating every structural invariant on the way in
//! 3. Draw reproducible random walks over the model with a [`PathSampler`]
//!
//! ## Architecture
//!
//! ```text
//! archive bytes → codec::decode → AtsModel → PathSampler
//!                                    ↓
//!                        caller mutation (initial states)
//!                                    ↓
//!                            codec::encode → archive bytes
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same model → identical archive bytes
//! - Decoding then re-encoding an archive reproduces it byte for byte
//! - Same model + same seed + same arguments → identical sampled path
//!
//! ## Example
//!
//! ```
//! use umb_kernel::{codec, AtsModel, Distribution, Label};
//!
//! let mut model = AtsModel::new(3);
//! model.add_choice(0, Distribution::new([(1, 0.5), (2, 0.5)])?)?;
//! model.add_choice(1, Distribution::dirac(0))?;
//! model.set_initial_states(vec![0])?;
//! model.label_state(2, Label::new("goal"))?;
//!
//! let bytes = codec::encode(&model)?;
//! let decoded = codec::decode(&bytes)?;
//! assert_eq!(decoded, model);
//!
//! let path = decoded.sample_path(0, 10, Some(42))?;
//! assert_eq!(path[0], 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod codec;
pub mod sampler;
pub mod canonical;
pub mod config;
pub mod error;

// Re-exports
pub use types::{
    AnnotationRefs, AnnotationStore, AtsModel, Branch, Choice, Choices, Distribution, Label,
    LabelId, LabelValue, ModelInfo, ModelSummary, StateAttributes, StateId, TimeType,
    TransitionTable,
};
pub use codec::{
    decode, decode_with, encode, encode_with, read_file, read_file_with, read_from, write_file,
    write_file_with, write_to, SegmentTag, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR,
};
pub use sampler::PathSampler;
pub use canonical::{canonical_hash, canonical_hash_hex, checksum, fingerprint_hex, to_canonical_bytes};
pub use config::{CodecConfig, Compression, DEFAULT_PROBABILITY_TOLERANCE};
pub use error::{ErrorKind, ModelError, UmbError};

/// Conventional file extension for UMB archives.
pub const UMB_FILE_EXTENSION: &str = "umb";
