//! Random walks over an [`AtsModel`].
//!
//! ## Resolution Policy
//!
//! At every step the sampler:
//!
//! 1. stops if the current state has no choices (deadlock truncation),
//! 2. picks one of the state's choices uniformly at random,
//! 3. draws `u` in `[0, 1)` and inverts the choice's cumulative
//!    distribution to find the successor.
//!
//! ## Determinism Guarantees
//!
//! The generator is ChaCha8 seeded from a `u64`. Same seed + same model +
//! same arguments → identical path. Indices are drawn as `u64`, so the
//! result does not depend on the target's pointer width.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::error::ModelError;
use crate::types::{AtsModel, StateId};

/// Seeded random-walk generator bound to one model.
#[derive(Debug, Clone)]
pub struct PathSampler<'a> {
    model: &'a AtsModel,
    rng: ChaCha8Rng,
    seed: u64,
}

impl<'a> PathSampler<'a> {
    /// Create a sampler. Without a seed, one is drawn from the thread RNG and
    /// can be read back with [`PathSampler::seed`] to replay the walk.
    pub fn new(model: &'a AtsModel, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        Self {
            model,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed the generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Walk up to `length` steps from `start`.
    ///
    /// The result starts with `start` and holds at most `length + 1` ids.
    /// It is shorter when a state without choices is reached.
    pub fn sample_path(&mut self, start: StateId, length: usize) -> Result<Vec<StateId>, ModelError> {
        // Range check before allocating.
        self.model.choices_of(start)?;

        let mut path = Vec::with_capacity(length + 1);
        path.push(start);
        let mut current = start;
        for _ in 0..length {
            match self.step(current)? {
                Some(next) => {
                    path.push(next);
                    current = next;
                }
                None => {
                    trace!(state = current, steps = path.len() - 1, "path truncated at deadlock");
                    break;
                }
            }
        }
        Ok(path)
    }

    /// Walk from an initial state picked uniformly at random.
    ///
    /// Returns `Ok(None)` if the model has no initial states.
    pub fn sample_from_initial(&mut self, length: usize) -> Result<Option<Vec<StateId>>, ModelError> {
        let initial = self.model.initial_states();
        if initial.is_empty() {
            return Ok(None);
        }
        let start = initial[self.pick(initial.len())];
        self.sample_path(start, length).map(Some)
    }

    /// One transition out of `state`; `None` at a deadlock.
    pub fn step(&mut self, state: StateId) -> Result<Option<StateId>, ModelError> {
        let Some(choice) = self.sample_choice(state)? else {
            return Ok(None);
        };
        let u: f64 = self.rng.gen();
        Ok(self.model.choice(choice)?.resolve(u))
    }

    /// Global index of a uniformly chosen choice of `state`.
    pub fn sample_choice(&mut self, state: StateId) -> Result<Option<usize>, ModelError> {
        let choices = self.model.transitions().choice_range(state)?;
        if choices.is_empty() {
            return Ok(None);
        }
        Ok(Some(choices.start + self.pick(choices.len())))
    }

    /// Uniform index in `0..n`; `n` must be non-zero.
    fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n as u64) as usize
    }
}
