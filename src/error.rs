//! Error types for the UMB kernel.
//!
//! Two layers:
//!
//! - [`ModelError`]: usage errors raised synchronously by model, table and
//!   annotation-store calls (out-of-range ids, malformed distributions).
//! - [`UmbError`]: everything the codec can report. Model errors are wrapped
//!   as [`UmbError::Usage`]; structural violations found while decoding are
//!   reported as [`UmbError::Integrity`] with the offending segment and record.

use crate::codec::SegmentTag;
use crate::types::StateId;

/// Usage error raised by model operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// State id is not below `num_states`.
    #[error("State {state} out of range (num_states = {num_states})")]
    StateOutOfRange {
        /// The offending state id.
        state: u64,
        /// Number of states in the model.
        num_states: usize,
    },

    /// Global choice index is not below `num_choices`.
    #[error("Choice {choice} out of range (num_choices = {num_choices})")]
    ChoiceOutOfRange {
        /// The offending choice index.
        choice: usize,
        /// Number of choices in the model.
        num_choices: usize,
    },

    /// Annotation index does not exist in the pool.
    #[error("Annotation index {index} out of range (pool size = {len})")]
    AnnotationOutOfRange {
        /// The offending label id.
        index: u64,
        /// Number of interned labels.
        len: usize,
    },

    /// Distribution is empty, has a negative or non-finite probability, or
    /// does not sum to one within tolerance.
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// The same state was listed twice as initial.
    #[error("Duplicate initial state {0}")]
    DuplicateInitialState(StateId),

    /// A per-state attribute vector does not have one entry per state.
    #[error("{attribute} has {len} entries, expected {num_states}")]
    AttributeLength {
        /// Attribute name.
        attribute: &'static str,
        /// Entries supplied.
        len: usize,
        /// Number of states in the model.
        num_states: usize,
    },

    /// A state is owned by a player that does not exist.
    #[error("State {state} owned by player {player} (num_players = {num_players})")]
    PlayerOutOfRange {
        /// The offending state.
        state: StateId,
        /// Its owner.
        player: u32,
        /// Number of players.
        num_players: u32,
    },

    /// Exit rate is negative or not finite.
    #[error("State {state} has invalid exit rate {rate}")]
    InvalidExitRate {
        /// The offending state.
        state: StateId,
        /// The rate.
        rate: f64,
    },

    /// An operation needs an initial state but the model has none.
    #[error("Model has no initial states")]
    NoInitialStates,
}

/// Coarse error category, mirroring the four error classes of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed container, manifest or segment.
    Format,
    /// Structural invariant violated by decoded data.
    Integrity,
    /// Underlying read/write failure.
    Io,
    /// Invalid arguments to an API call.
    Usage,
}

/// Error type for encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum UmbError {
    /// Container, manifest or segment is malformed.
    #[error("Format error: {0}")]
    Format(String),

    /// Archive or segment declares a major version this build cannot read.
    #[error("Unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the archive.
        found: u16,
        /// Version supported by this build.
        supported: u16,
    },

    /// Decoded data violates a structural invariant.
    #[error("Integrity error in {segment} segment at record {record}: {reason}")]
    Integrity {
        /// Segment where the violation was found.
        segment: SegmentTag,
        /// Record index inside the segment.
        record: u64,
        /// What went wrong.
        reason: String,
    },

    /// I/O failure; the original cause is preserved.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid arguments passed by the caller.
    #[error("Usage error: {0}")]
    Usage(#[from] ModelError),
}

impl UmbError {
    /// Build a format error from anything displayable.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Build an integrity error for a segment record.
    pub fn integrity(segment: SegmentTag, record: u64, reason: impl Into<String>) -> Self {
        Self::Integrity {
            segment,
            record,
            reason: reason.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) | Self::UnsupportedVersion { .. } => ErrorKind::Format,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Io(_) => ErrorKind::Io,
            Self::Usage(_) => ErrorKind::Usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(UmbError::format("bad").kind(), ErrorKind::Format);
        assert_eq!(
            UmbError::UnsupportedVersion { found: 9, supported: 1 }.kind(),
            ErrorKind::Format
        );
        assert_eq!(
            UmbError::integrity(SegmentTag::Transitions, 3, "target out of range").kind(),
            ErrorKind::Integrity
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(UmbError::from(io).kind(), ErrorKind::Io);
        let usage = ModelError::DuplicateInitialState(2);
        assert_eq!(UmbError::from(usage).kind(), ErrorKind::Usage);
        assert_eq!(UmbError::from(ModelError::NoInitialStates).kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_integrity_message_names_location() {
        let err = UmbError::integrity(SegmentTag::Transitions, 7, "target 12 >= num_states 4");
        let msg = err.to_string();
        assert!(msg.contains("transitions"));
        assert!(msg.contains("record 7"));
    }
}
