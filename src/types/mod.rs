//! Core types for the in-memory transition system.

pub mod distribution;
pub mod transition;
pub mod annotation;
pub mod attributes;
pub mod model;

/// State identifier: an index in `0..num_states`.
pub type StateId = u32;

/// Index of a label in the [`AnnotationStore`].
pub type LabelId = u32;

pub use distribution::{Branch, Choice, Distribution};
pub use transition::{Choices, TransitionTable};
pub use annotation::{AnnotationRefs, AnnotationStore, Label, LabelValue};
pub use attributes::StateAttributes;
pub use model::{AtsModel, ModelInfo, ModelSummary, TimeType};
