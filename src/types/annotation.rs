//! Interned labels attached to states and choices.
//!
//! A [`Label`] is a key with an optional typed value. Atomic propositions are
//! bare keys or boolean values, action names are text values on choices,
//! rewards are numeric values. Each distinct label occupies exactly one slot
//! of the [`AnnotationStore`]; states and choices refer to it by [`LabelId`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::LabelId;
use crate::error::ModelError;

/// Typed value carried by a label.
///
/// Equality and ordering over `Real` are bitwise (`f64::total_cmp`), so
/// interning is a structural comparison that also works for NaN and `-0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelValue {
    /// Boolean (atomic propositions).
    Bool(bool),
    /// Integer (counters, observations).
    Int(i64),
    /// Real number (rewards, valuations).
    Real(f64),
    /// Text (action names).
    Text(String),
}

impl LabelValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Real(_) => 2,
            Self::Text(_) => 3,
        }
    }
}

impl PartialEq for LabelValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LabelValue {}

impl PartialOrd for LabelValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// A label: string key, optionally with a value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    key: String,
    value: Option<LabelValue>,
}

impl Label {
    /// Bare label.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Label with a value.
    pub fn with_value(key: impl Into<String>, value: LabelValue) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    /// Action-name label (`action = "<name>"`).
    pub fn action(name: impl Into<String>) -> Self {
        Self::with_value("action", LabelValue::Text(name.into()))
    }

    /// Reward label (`<name> = <value>`).
    pub fn reward(name: impl Into<String>, value: f64) -> Self {
        Self::with_value(name, LabelValue::Real(value))
    }

    /// The key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value, if any.
    pub fn value(&self) -> Option<&LabelValue> {
        self.value.as_ref()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Interning pool for labels.
///
/// Ids are allocated in first-seen order, which keeps encoding deterministic.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    labels: Vec<Label>,
    ids: BTreeMap<Label, LabelId>,
}

impl AnnotationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `label`, allocating a new slot if it is unseen.
    pub fn intern(&mut self, label: Label) -> LabelId {
        if let Some(&id) = self.ids.get(&label) {
            return id;
        }
        let id = self.labels.len() as LabelId;
        self.ids.insert(label.clone(), id);
        self.labels.push(label);
        id
    }

    /// Id of an already interned label.
    pub fn lookup(&self, label: &Label) -> Option<LabelId> {
        self.ids.get(label).copied()
    }

    /// Label stored at `id`.
    pub fn resolve(&self, id: LabelId) -> Result<&Label, ModelError> {
        self.labels
            .get(id as usize)
            .ok_or(ModelError::AnnotationOutOfRange {
                index: id as u64,
                len: self.labels.len(),
            })
    }

    /// Number of interned labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in id order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Check that `id` exists.
    pub fn check(&self, id: LabelId) -> Result<(), ModelError> {
        self.resolve(id).map(|_| ())
    }
}

impl PartialEq for AnnotationStore {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

/// Per-entity label references (CSR): row `i` lists the label ids attached
/// to state or choice `i`, in attachment order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRefs {
    offsets: Vec<usize>,
    ids: Vec<LabelId>,
}

impl AnnotationRefs {
    /// `rows` empty rows.
    pub fn new(rows: usize) -> Self {
        Self {
            offsets: vec![0; rows + 1],
            ids: Vec::new(),
        }
    }

    pub(crate) fn from_parts(offsets: Vec<usize>, ids: Vec<LabelId>) -> Self {
        debug_assert_eq!(offsets.last().copied(), Some(ids.len()));
        Self { offsets, ids }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of references.
    pub fn num_refs(&self) -> usize {
        self.ids.len()
    }

    /// Label ids of row `row`, or `None` past the last row.
    pub fn row(&self, row: usize) -> Option<&[LabelId]> {
        let end = *self.offsets.get(row.checked_add(1)?)?;
        Some(&self.ids[self.offsets[row]..end])
    }

    fn slice(&self, row: usize) -> &[LabelId] {
        &self.ids[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Attach `id` to `row` unless it is already attached.
    pub(crate) fn attach(&mut self, row: usize, id: LabelId) {
        if self.slice(row).contains(&id) {
            return;
        }
        let at = self.offsets[row + 1];
        self.ids.insert(at, id);
        for offset in &mut self.offsets[row + 1..] {
            *offset += 1;
        }
    }

    /// Insert an empty row before `row` (used when a choice is inserted in
    /// the middle of the choice arena).
    pub(crate) fn insert_empty_row(&mut self, row: usize) {
        let at = self.offsets[row];
        self.offsets.insert(row, at);
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &[LabelId]> + '_ {
        (0..self.rows()).map(move |r| self.slice(r))
    }
}
