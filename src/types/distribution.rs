//! Probability distributions over successor states.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::StateId;
use crate::config::DEFAULT_PROBABILITY_TOLERANCE;
use crate::error::ModelError;

/// One `(target, probability)` entry of a choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Successor state.
    pub target: StateId,
    /// Probability of moving to `target`.
    pub probability: f64,
}

impl Branch {
    /// Create a new branch.
    pub fn new(target: StateId, probability: f64) -> Self {
        Self { target, probability }
    }
}

/// A validated, ordered distribution over successor states.
///
/// Branch order is preserved exactly; it is part of the canonical encoding.
/// Duplicate targets are allowed and keep their own entries. Deserializing
/// runs the same checks as [`Distribution::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistribution")]
pub struct Distribution {
    branches: Vec<Branch>,
}

/// Unchecked wire shape of a [`Distribution`].
#[derive(Deserialize)]
struct RawDistribution {
    branches: Vec<Branch>,
}

impl TryFrom<RawDistribution> for Distribution {
    type Error = ModelError;

    fn try_from(raw: RawDistribution) -> Result<Self, Self::Error> {
        check_branches(&raw.branches, DEFAULT_PROBABILITY_TOLERANCE)?;
        Ok(Self {
            branches: raw.branches,
        })
    }
}

impl Distribution {
    /// Validate `pairs` with the default tolerance.
    pub fn new<I>(pairs: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (StateId, f64)>,
    {
        Self::with_tolerance(pairs, DEFAULT_PROBABILITY_TOLERANCE)
    }

    /// Validate `pairs` with an explicit tolerance on the total mass.
    pub fn with_tolerance<I>(pairs: I, tolerance: f64) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (StateId, f64)>,
    {
        let branches: Vec<Branch> = pairs
            .into_iter()
            .map(|(target, probability)| Branch::new(target, probability))
            .collect();
        check_branches(&branches, tolerance)?;
        Ok(Self { branches })
    }

    /// Point distribution: move to `target` with probability one.
    pub fn dirac(target: StateId) -> Self {
        Self {
            branches: vec![Branch::new(target, 1.0)],
        }
    }

    /// Uniform distribution over `targets`.
    pub fn uniform(targets: &[StateId]) -> Result<Self, ModelError> {
        if targets.is_empty() {
            return Err(ModelError::InvalidDistribution(
                "distribution has no branches".to_string(),
            ));
        }
        let p = 1.0 / targets.len() as f64;
        Self::new(targets.iter().map(|&t| (t, p)))
    }

    /// Branches in their stored order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Always false for a validated distribution.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Largest target id, if any.
    pub fn max_target(&self) -> Option<StateId> {
        self.branches.iter().map(|b| b.target).max()
    }

    pub(crate) fn into_branches(self) -> Vec<Branch> {
        self.branches
    }
}

/// Check the distribution invariants on raw branches.
///
/// Targets are not range-checked here; that needs the owning model.
pub(crate) fn check_branches(branches: &[Branch], tolerance: f64) -> Result<(), ModelError> {
    if branches.is_empty() {
        return Err(ModelError::InvalidDistribution(
            "distribution has no branches".to_string(),
        ));
    }

    let mut total = 0.0;
    for (i, branch) in branches.iter().enumerate() {
        if !branch.probability.is_finite() {
            return Err(ModelError::InvalidDistribution(format!(
                "branch {i} has non-finite probability {}",
                branch.probability
            )));
        }
        if branch.probability < 0.0 {
            return Err(ModelError::InvalidDistribution(format!(
                "branch {i} has negative probability {}",
                branch.probability
            )));
        }
        total += branch.probability;
    }

    // One ulp of slack absorbs the rounding of the sum itself.
    if (total - 1.0).abs() > tolerance + f64::EPSILON {
        return Err(ModelError::InvalidDistribution(format!(
            "probabilities sum to {total}, expected 1.0 (tolerance {tolerance:e})"
        )));
    }
    Ok(())
}

/// Borrowed view of one choice stored in a [`TransitionTable`](super::TransitionTable).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice<'a> {
    index: usize,
    branches: &'a [Branch],
}

impl<'a> Choice<'a> {
    pub(crate) fn new(index: usize, branches: &'a [Branch]) -> Self {
        Self { index, branches }
    }

    /// Global choice index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Branches in stored order.
    pub fn branches(&self) -> &'a [Branch] {
        self.branches
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// True if the choice has no branches (never produced by a valid model).
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Sum of all branch probabilities.
    pub fn total_mass(&self) -> f64 {
        self.branches.iter().map(|b| b.probability).sum()
    }

    /// Probability per distinct target, duplicate targets merged.
    pub fn merged(&self) -> BTreeMap<StateId, f64> {
        let mut distr = BTreeMap::new();
        for branch in self.branches {
            *distr.entry(branch.target).or_insert(0.0) += branch.probability;
        }
        distr
    }

    /// Resolve a uniform draw `u` in `[0, 1)` to a successor by inverting the
    /// cumulative distribution.
    ///
    /// `u` is scaled by the total mass so that distributions summing to
    /// slightly less than one still cover the whole unit interval.
    /// Zero-probability branches are never selected.
    pub fn resolve(&self, u: f64) -> Option<StateId> {
        let scaled = u * self.total_mass();
        let mut cumulative = 0.0;
        for branch in self.branches {
            cumulative += branch.probability;
            if scaled < cumulative {
                return Some(branch.target);
            }
        }
        // Rounding left `scaled` at the very top of the range.
        self.branches
            .iter()
            .rev()
            .find(|b| b.probability > 0.0)
            .map(|b| b.target)
    }
}
