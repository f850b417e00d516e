//! Sparse per-state transition storage.
//!
//! All choices live in one contiguous arena, indexed the same way the UMB
//! format lays them out:
//!
//! ```text
//! state_offsets[s]..state_offsets[s+1]    → global choice ids of state s
//! choice_offsets[c]..choice_offsets[c+1]  → branch slots of choice c
//! branches[b]                             → (target, probability)
//! ```
//!
//! Lookup of a state's choices and of a choice's branches is O(1).
//! Appending to the last state with choices is amortized O(1); appending to
//! an earlier state shifts the tail of the arena.

use std::ops::Range;

use super::distribution::{Branch, Choice, Distribution};
use super::StateId;
use crate::error::ModelError;

/// Per-state choice table in CSR form.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    state_offsets: Vec<usize>,
    choice_offsets: Vec<usize>,
    branches: Vec<Branch>,
}

impl TransitionTable {
    /// Table for `num_states` states, none of which has choices yet.
    pub fn new(num_states: usize) -> Self {
        Self {
            state_offsets: vec![0; num_states + 1],
            choice_offsets: vec![0],
            branches: Vec::new(),
        }
    }

    /// Build directly from arena parts. Offsets must be monotone and end at
    /// the lengths of the next level.
    pub(crate) fn from_parts(
        state_offsets: Vec<usize>,
        choice_offsets: Vec<usize>,
        branches: Vec<Branch>,
    ) -> Self {
        debug_assert_eq!(state_offsets.last().copied(), Some(choice_offsets.len() - 1));
        debug_assert_eq!(choice_offsets.last().copied(), Some(branches.len()));
        Self {
            state_offsets,
            choice_offsets,
            branches,
        }
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.state_offsets.len() - 1
    }

    /// Total number of choices over all states.
    pub fn num_choices(&self) -> usize {
        self.choice_offsets.len() - 1
    }

    /// Total number of branches over all choices.
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    fn check_state(&self, state: StateId) -> Result<usize, ModelError> {
        let s = state as usize;
        if s >= self.num_states() {
            return Err(ModelError::StateOutOfRange {
                state: state as u64,
                num_states: self.num_states(),
            });
        }
        Ok(s)
    }

    /// Global choice ids belonging to `state`.
    pub fn choice_range(&self, state: StateId) -> Result<Range<usize>, ModelError> {
        let s = self.check_state(state)?;
        Ok(self.state_offsets[s]..self.state_offsets[s + 1])
    }

    /// Choices of `state`, in order.
    pub fn choices_of(&self, state: StateId) -> Result<Choices<'_>, ModelError> {
        let range = self.choice_range(state)?;
        Ok(Choices { table: self, range })
    }

    /// Number of choices of `state`.
    pub fn num_choices_of(&self, state: StateId) -> Result<usize, ModelError> {
        Ok(self.choice_range(state)?.len())
    }

    /// Choice by global index.
    pub fn choice(&self, choice: usize) -> Result<Choice<'_>, ModelError> {
        if choice >= self.num_choices() {
            return Err(ModelError::ChoiceOutOfRange {
                choice,
                num_choices: self.num_choices(),
            });
        }
        Ok(self.choice_unchecked(choice))
    }

    fn choice_unchecked(&self, choice: usize) -> Choice<'_> {
        let range = self.choice_offsets[choice]..self.choice_offsets[choice + 1];
        Choice::new(choice, &self.branches[range])
    }

    /// State owning a global choice index.
    pub fn state_of_choice(&self, choice: usize) -> Result<StateId, ModelError> {
        if choice >= self.num_choices() {
            return Err(ModelError::ChoiceOutOfRange {
                choice,
                num_choices: self.num_choices(),
            });
        }
        // Last state whose first choice is <= `choice`, skipping empty states.
        let s = self.state_offsets.partition_point(|&start| start <= choice) - 1;
        Ok(s as StateId)
    }

    /// Append a choice to `state` and return its global index.
    ///
    /// Every target must be a valid state.
    pub fn add_choice(
        &mut self,
        state: StateId,
        distribution: Distribution,
    ) -> Result<usize, ModelError> {
        let s = self.check_state(state)?;
        if let Some(max) = distribution.max_target() {
            if max as usize >= self.num_states() {
                return Err(ModelError::StateOutOfRange {
                    state: max as u64,
                    num_states: self.num_states(),
                });
            }
        }

        let choice = self.state_offsets[s + 1];
        let branch_at = self.choice_offsets[choice];
        let new_branches = distribution.into_branches();
        let width = new_branches.len();

        self.branches.splice(branch_at..branch_at, new_branches);
        self.choice_offsets.insert(choice + 1, branch_at + width);
        for offset in &mut self.choice_offsets[choice + 2..] {
            *offset += width;
        }
        for offset in &mut self.state_offsets[s + 1..] {
            *offset += 1;
        }
        Ok(choice)
    }

    /// Raw arena: per-state choice offsets.
    pub fn state_offsets(&self) -> &[usize] {
        &self.state_offsets
    }

    /// Raw arena: per-choice branch offsets.
    pub fn choice_offsets(&self) -> &[usize] {
        &self.choice_offsets
    }

    /// Raw arena: all branches.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

/// Iterator over the choices of one state.
#[derive(Debug, Clone)]
pub struct Choices<'a> {
    table: &'a TransitionTable,
    range: Range<usize>,
}

impl<'a> Choices<'a> {
    /// Number of remaining choices.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// True if the state has no (remaining) choices.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// The `i`-th remaining choice.
    pub fn get(&self, i: usize) -> Option<Choice<'a>> {
        if i < self.range.len() {
            Some(self.table.choice_unchecked(self.range.start + i))
        } else {
            None
        }
    }
}

impl<'a> Iterator for Choices<'a> {
    type Item = Choice<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.range.next()?;
        Some(self.table.choice_unchecked(c))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl ExactSizeIterator for Choices<'_> {}
