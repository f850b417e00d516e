//! The ATS aggregate root.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::annotation::{AnnotationRefs, AnnotationStore, Label};
use super::attributes::StateAttributes;
use super::distribution::{check_branches, Choice, Distribution};
use super::transition::{Choices, TransitionTable};
use super::{LabelId, StateId};
use crate::error::ModelError;
use crate::sampler::PathSampler;

/// How time elapses in the transition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeType {
    /// Discrete-time steps.
    #[default]
    Discrete,
    /// Continuous time with exponential delays.
    Stochastic,
    /// Continuous time where some states are left immediately.
    UrgentStochastic,
}

impl TimeType {
    /// Parse a time type from its wire name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "discrete" => Some(Self::Discrete),
            "stochastic" => Some(Self::Stochastic),
            "urgent-stochastic" => Some(Self::UrgentStochastic),
            _ => None,
        }
    }
}

impl fmt::Display for TimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Stochastic => write!(f, "stochastic"),
            Self::UrgentStochastic => write!(f, "urgent-stochastic"),
        }
    }
}

/// Descriptive metadata about the model. All fields optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Model version.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    /// Authors.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// Free-form comment.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    /// DOI of the publication describing the model.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doi: Option<String>,
    /// Where the model comes from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

/// Size statistics of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Time type.
    pub time: TimeType,
    /// Number of states.
    pub num_states: usize,
    /// Number of initial states.
    pub num_initial_states: usize,
    /// Number of choices.
    pub num_choices: usize,
    /// Number of branches.
    pub num_branches: usize,
    /// States without choices.
    pub num_deadlock_states: usize,
    /// Number of interned labels.
    pub num_labels: usize,
    /// Number of players.
    pub num_players: u32,
    /// Number of Markovian states, if flags are recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_markovian_states: Option<usize>,
    /// Model name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Annotated transition system.
///
/// Owns its transition table and annotation store exclusively. States are
/// the dense range `0..num_states`. Initial states keep their order, which
/// is significant for round-trip fidelity but not for semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct AtsModel {
    initial_states: Vec<StateId>,
    transitions: TransitionTable,
    annotations: AnnotationStore,
    state_labels: AnnotationRefs,
    choice_labels: AnnotationRefs,
    attributes: StateAttributes,
    time: TimeType,
    info: Option<ModelInfo>,
}

/// Decoded pieces handed to [`AtsModel::from_parts`].
pub(crate) struct ModelParts {
    pub initial_states: Vec<StateId>,
    pub transitions: TransitionTable,
    pub annotations: AnnotationStore,
    pub state_labels: AnnotationRefs,
    pub choice_labels: AnnotationRefs,
    pub attributes: StateAttributes,
    pub time: TimeType,
    pub info: Option<ModelInfo>,
}

impl AtsModel {
    /// Model with `num_states` states, no initial states and no choices.
    pub fn new(num_states: StateId) -> Self {
        let n = num_states as usize;
        Self {
            initial_states: Vec::new(),
            transitions: TransitionTable::new(n),
            annotations: AnnotationStore::new(),
            state_labels: AnnotationRefs::new(n),
            choice_labels: AnnotationRefs::new(0),
            attributes: StateAttributes::default(),
            time: TimeType::default(),
            info: None,
        }
    }

    /// Assemble a model from parts that the decoder already validated.
    pub(crate) fn from_parts(parts: ModelParts) -> Self {
        debug_assert_eq!(parts.state_labels.rows(), parts.transitions.num_states());
        debug_assert_eq!(parts.choice_labels.rows(), parts.transitions.num_choices());
        Self {
            initial_states: parts.initial_states,
            transitions: parts.transitions,
            annotations: parts.annotations,
            state_labels: parts.state_labels,
            choice_labels: parts.choice_labels,
            attributes: parts.attributes,
            time: parts.time,
            info: parts.info,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // States
    // ─────────────────────────────────────────────────────────────────────

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.transitions.num_states()
    }

    /// Number of choices over all states.
    pub fn num_choices(&self) -> usize {
        self.transitions.num_choices()
    }

    /// Number of branches over all choices.
    pub fn num_branches(&self) -> usize {
        self.transitions.num_branches()
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

    fn check_choice(&self, choice: usize) -> Result<(), ModelError> {
        if choice >= self.num_choices() {
            return Err(ModelError::ChoiceOutOfRange {
                choice,
                num_choices: self.num_choices(),
            });
        }
        Ok(())
    }

    /// Initial states in stored order.
    pub fn initial_states(&self) -> &[StateId] {
        &self.initial_states
    }

    /// Replace the initial states.
    ///
    /// Every id must be a valid state and appear at most once. On error the
    /// previous initial states are kept.
    pub fn set_initial_states(&mut self, states: Vec<StateId>) -> Result<(), ModelError> {
        let mut seen = BTreeSet::new();
        for &state in &states {
            self.check_state(state)?;
            if !seen.insert(state) {
                return Err(ModelError::DuplicateInitialState(state));
            }
        }
        self.initial_states = states;
        Ok(())
    }

    /// True if `state` is listed as initial.
    pub fn is_initial(&self, state: StateId) -> bool {
        self.initial_states.contains(&state)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// The transition table.
    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Choices of `state`, in order. Empty for deadlock states.
    pub fn choices_of(&self, state: StateId) -> Result<Choices<'_>, ModelError> {
        self.transitions.choices_of(state)
    }

    /// Choice by global index.
    pub fn choice(&self, choice: usize) -> Result<Choice<'_>, ModelError> {
        self.transitions.choice(choice)
    }

    /// State owning a global choice index.
    pub fn state_of_choice(&self, choice: usize) -> Result<StateId, ModelError> {
        self.transitions.state_of_choice(choice)
    }

    /// Append a choice to `state`; returns its global index.
    pub fn add_choice(
        &mut self,
        state: StateId,
        distribution: Distribution,
    ) -> Result<usize, ModelError> {
        let choice = self.transitions.add_choice(state, distribution)?;
        self.choice_labels.insert_empty_row(choice);
        Ok(choice)
    }

    /// All states reachable in one step from `state`.
    pub fn state_successors(&self, state: StateId) -> Result<BTreeSet<StateId>, ModelError> {
        Ok(self
            .choices_of(state)?
            .flat_map(|c| c.branches().iter().map(|b| b.target))
            .collect())
    }

    /// Distribution of a choice with duplicate targets merged.
    pub fn choice_distribution(&self, choice: usize) -> Result<BTreeMap<StateId, f64>, ModelError> {
        Ok(self.choice(choice)?.merged())
    }

    /// States without any choice.
    pub fn deadlock_states(&self) -> Vec<StateId> {
        self.transitions
            .state_offsets()
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] == w[1])
            .map(|(s, _)| s as StateId)
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Annotations
    // ─────────────────────────────────────────────────────────────────────

    /// The label pool.
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// Intern `label` without attaching it anywhere.
    pub fn intern_label(&mut self, label: Label) -> LabelId {
        self.annotations.intern(label)
    }

    /// Attach `label` to `state`; returns the label id.
    pub fn label_state(&mut self, state: StateId, label: Label) -> Result<LabelId, ModelError> {
        let s = self.check_state(state)?;
        let id = self.annotations.intern(label);
        self.state_labels.attach(s, id);
        Ok(id)
    }

    /// Attach `label` to a choice; returns the label id.
    pub fn label_choice(&mut self, choice: usize, label: Label) -> Result<LabelId, ModelError> {
        self.check_choice(choice)?;
        let id = self.annotations.intern(label);
        self.choice_labels.attach(choice, id);
        Ok(id)
    }

    /// Label ids attached to `state`.
    pub fn state_labels(&self, state: StateId) -> Result<&[LabelId], ModelError> {
        let s = self.check_state(state)?;
        Ok(self.state_labels.row(s).unwrap_or_default())
    }

    /// Label ids attached to a choice.
    pub fn choice_labels(&self, choice: usize) -> Result<&[LabelId], ModelError> {
        self.check_choice(choice)?;
        Ok(self.choice_labels.row(choice).unwrap_or_default())
    }

    /// Resolved labels of `state`.
    pub fn state_label_values(&self, state: StateId) -> Result<Vec<&Label>, ModelError> {
        self.state_labels(state)?
            .iter()
            .map(|&id| self.annotations.resolve(id))
            .collect()
    }

    /// All states carrying `label`, ascending.
    pub fn states_labelled(&self, label: &Label) -> Vec<StateId> {
        let Some(id) = self.annotations.lookup(label) else {
            return Vec::new();
        };
        self.state_labels
            .iter()
            .enumerate()
            .filter(|(_, row)| row.contains(&id))
            .map(|(s, _)| s as StateId)
            .collect()
    }

    pub(crate) fn state_label_refs(&self) -> &AnnotationRefs {
        &self.state_labels
    }

    pub(crate) fn choice_label_refs(&self) -> &AnnotationRefs {
        &self.choice_labels
    }

    // ─────────────────────────────────────────────────────────────────────
    // State attributes
    // ─────────────────────────────────────────────────────────────────────

    /// Players, Markovian flags and exit rates.
    pub fn attributes(&self) -> &StateAttributes {
        &self.attributes
    }

    /// Number of players.
    pub fn num_players(&self) -> u32 {
        self.attributes.num_players()
    }

    /// Set the number of players and, optionally, the owner of every state.
    ///
    /// `owners` needs one entry per state, each below `num_players`. On
    /// error the previous assignment is kept.
    pub fn set_players(&mut self, num_players: u32, owners: Option<Vec<u32>>) -> Result<(), ModelError> {
        let n = self.num_states();
        self.attributes.set_players(n, num_players, owners)
    }

    /// Owner of `state`, if ownership is recorded.
    pub fn player_of(&self, state: StateId) -> Result<Option<u32>, ModelError> {
        let s = self.check_state(state)?;
        Ok(self.attributes.state_to_player().map(|owners| owners[s]))
    }

    /// Mark exactly `states` as Markovian; `None` drops the flags.
    pub fn set_markovian_states(&mut self, states: Option<Vec<StateId>>) -> Result<(), ModelError> {
        let flags = match states {
            Some(states) => {
                let mut flags = vec![false; self.num_states()];
                for state in states {
                    flags[self.check_state(state)?] = true;
                }
                Some(flags)
            }
            None => None,
        };
        self.attributes.set_markovian(flags);
        Ok(())
    }

    /// Markovian states ascending, if flags are recorded.
    pub fn markovian_states(&self) -> Option<Vec<StateId>> {
        self.attributes.markovian().map(|flags| {
            flags
                .iter()
                .enumerate()
                .filter(|(_, m)| **m)
                .map(|(s, _)| s as StateId)
                .collect()
        })
    }

    /// Markovian flag of `state`, if flags are recorded.
    pub fn is_markovian(&self, state: StateId) -> Result<Option<bool>, ModelError> {
        let s = self.check_state(state)?;
        Ok(self.attributes.markovian().map(|flags| flags[s]))
    }

    /// Replace the exit rates; one finite, non-negative rate per state.
    pub fn set_exit_rates(&mut self, rates: Option<Vec<f64>>) -> Result<(), ModelError> {
        let n = self.num_states();
        self.attributes.set_exit_rates(n, rates)
    }

    /// Exit rate of `state`, if rates are recorded.
    pub fn exit_rate(&self, state: StateId) -> Result<Option<f64>, ModelError> {
        let s = self.check_state(state)?;
        Ok(self.attributes.exit_rates().map(|rates| rates[s]))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────

    /// Time type.
    pub fn time(&self) -> TimeType {
        self.time
    }

    /// Set the time type.
    pub fn set_time(&mut self, time: TimeType) {
        self.time = time;
    }

    /// Descriptive metadata.
    pub fn info(&self) -> Option<&ModelInfo> {
        self.info.as_ref()
    }

    /// Replace the descriptive metadata.
    pub fn set_info(&mut self, info: Option<ModelInfo>) {
        self.info = info;
    }

    /// Size statistics.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            time: self.time,
            num_states: self.num_states(),
            num_initial_states: self.initial_states.len(),
            num_choices: self.num_choices(),
            num_branches: self.num_branches(),
            num_deadlock_states: self.deadlock_states().len(),
            num_labels: self.annotations.len(),
            num_players: self.num_players(),
            num_markovian_states: self.markovian_states().map(|m| m.len()),
            name: self.info.as_ref().and_then(|i| i.name.clone()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validation and simulation
    // ─────────────────────────────────────────────────────────────────────

    /// Re-check every structural invariant.
    ///
    /// Models built through the public API always pass with the default
    /// tolerance; a stricter tolerance can reject existing choices.
    pub fn validate(&self, tolerance: f64) -> Result<(), ModelError> {
        let mut seen = BTreeSet::new();
        for &state in &self.initial_states {
            self.check_state(state)?;
            if !seen.insert(state) {
                return Err(ModelError::DuplicateInitialState(state));
            }
        }
        for c in 0..self.num_choices() {
            let choice = self.choice(c)?;
            check_branches(choice.branches(), tolerance)?;
            for branch in choice.branches() {
                self.check_state(branch.target)?;
            }
        }
        for row in self.state_labels.iter().chain(self.choice_labels.iter()) {
            for &id in row {
                self.annotations.check(id)?;
            }
        }
        self.attributes.validate(self.num_states())
    }

    /// Random walk of up to `length` steps from `state`.
    ///
    /// See [`PathSampler`] for the resolution policy. The same seed, model
    /// and arguments always give the same path.
    pub fn sample_path(
        &self,
        state: StateId,
        length: usize,
        seed: Option<u64>,
    ) -> Result<Vec<StateId>, ModelError> {
        PathSampler::new(self, seed).sample_path(state, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: StateId) -> AtsModel {
        let mut model = AtsModel::new(n);
        for s in 0..n - 1 {
            model.add_choice(s, Distribution::dirac(s + 1)).unwrap();
        }
        model.set_initial_states(vec![0]).unwrap();
        model
    }

    #[test]
    fn test_initial_states_validated() {
        let mut model = chain(3);
        assert!(matches!(
            model.set_initial_states(vec![3]),
            Err(ModelError::StateOutOfRange { state: 3, num_states: 3 })
        ));
        assert_eq!(
            model.set_initial_states(vec![1, 1]),
            Err(ModelError::DuplicateInitialState(1))
        );
        assert_eq!(model.initial_states(), &[0]);

        model.set_initial_states(vec![2, 0]).unwrap();
        assert_eq!(model.initial_states(), &[2, 0]);
        assert!(model.is_initial(2));
    }

    #[test]
    fn test_choice_labels_follow_inserted_choices() {
        let mut model = chain(4);
        model.label_choice(2, Label::action("last")).unwrap();
        // Insert a new choice for state 0, shifting the global choice ids.
        let c = model.add_choice(0, Distribution::dirac(3)).unwrap();
        assert_eq!(c, 1);
        assert_eq!(model.choice_labels(1).unwrap(), &[] as &[LabelId]);
        let moved = model.choice_labels(3).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(model.annotations().resolve(moved[0]).unwrap(), &Label::action("last"));
    }

    #[test]
    fn test_successors_and_deadlocks() {
        let mut model = chain(4);
        model.add_choice(0, Distribution::new([(2, 0.5), (3, 0.5)]).unwrap()).unwrap();
        assert_eq!(
            model.state_successors(0).unwrap().into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(model.deadlock_states(), vec![3]);
    }

    #[test]
    fn test_states_labelled() {
        let mut model = chain(4);
        model.label_state(1, Label::new("odd")).unwrap();
        model.label_state(3, Label::new("odd")).unwrap();
        model.label_state(3, Label::new("goal")).unwrap();
        assert_eq!(model.states_labelled(&Label::new("odd")), vec![1, 3]);
        assert_eq!(model.states_labelled(&Label::new("missing")), Vec::<StateId>::new());
        assert_eq!(model.state_label_values(3).unwrap().len(), 2);
    }

    #[test]
    fn test_validate_with_stricter_tolerance() {
        let mut model = AtsModel::new(2);
        model
            .add_choice(0, Distribution::new([(0, 0.5), (1, 0.5 - 5e-7)]).unwrap())
            .unwrap();
        assert!(model.validate(1e-6).is_ok());
        assert!(model.validate(1e-9).is_err());
    }

    #[test]
    fn test_summary() {
        let mut model = chain(3);
        model.set_time(TimeType::Stochastic);
        model.set_info(Some(ModelInfo {
            name: Some("chain".to_string()),
            ..ModelInfo::default()
        }));
        let summary = model.summary();
        assert_eq!(summary.num_states, 3);
        assert_eq!(summary.num_choices, 2);
        assert_eq!(summary.num_deadlock_states, 1);
        assert_eq!(summary.name.as_deref(), Some("chain"));
        assert_eq!(summary.time, TimeType::Stochastic);
    }

    #[test]
    fn test_state_attributes() {
        let mut model = chain(3);
        model.set_time(TimeType::UrgentStochastic);
        model.set_markovian_states(Some(vec![2, 0])).unwrap();
        model.set_exit_rates(Some(vec![1.5, 0.0, 4.0])).unwrap();
        model.set_players(2, Some(vec![1, 0, 1])).unwrap();

        assert_eq!(model.markovian_states(), Some(vec![0, 2]));
        assert_eq!(model.is_markovian(1).unwrap(), Some(false));
        assert_eq!(model.exit_rate(2).unwrap(), Some(4.0));
        assert_eq!(model.player_of(0).unwrap(), Some(1));
        assert!(model.validate(1e-6).is_ok());

        let summary = model.summary();
        assert_eq!(summary.num_players, 2);
        assert_eq!(summary.num_markovian_states, Some(2));
    }

    #[test]
    fn test_state_attributes_rejected() {
        let mut model = chain(3);
        assert!(matches!(
            model.set_markovian_states(Some(vec![3])),
            Err(ModelError::StateOutOfRange { state: 3, .. })
        ));
        assert_eq!(model.markovian_states(), None);
        assert!(matches!(
            model.set_exit_rates(Some(vec![1.0, 1.0])),
            Err(ModelError::AttributeLength { attribute: "exit_rates", len: 2, num_states: 3 })
        ));
        assert!(matches!(
            model.set_exit_rates(Some(vec![1.0, f64::NAN, 1.0])),
            Err(ModelError::InvalidExitRate { state: 1, .. })
        ));
        assert!(model.set_players(1, Some(vec![0, 1, 0])).is_err());
        assert_eq!(model.exit_rate(0).unwrap(), None);
        assert_eq!(model.player_of(0).unwrap(), None);
        assert!(model.exit_rate(3).is_err());
    }

    #[test]
    fn test_time_type_parsing() {
        assert_eq!(TimeType::from_name("urgent-stochastic"), Some(TimeType::UrgentStochastic));
        assert_eq!(TimeType::from_name("DISCRETE"), Some(TimeType::Discrete));
        assert_eq!(TimeType::from_name("hybrid"), None);
    }
}
