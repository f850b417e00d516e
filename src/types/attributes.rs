//! Optional per-state attributes: player ownership, Markovian flags and
//! exit rates.
//!
//! These give meaning to the continuous-time and multi-player variants of
//! the model. Every attribute vector, when present, has exactly one entry
//! per state.

use super::StateId;
use crate::error::ModelError;

/// Per-state attributes of a model.
///
/// `num_players` is 0 for a Markov chain and 1 for a decision process. With
/// more than one player, `state_to_player` names the owner of every state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateAttributes {
    num_players: u32,
    state_to_player: Option<Vec<u32>>,
    markovian: Option<Vec<bool>>,
    exit_rates: Option<Vec<f64>>,
}

impl StateAttributes {
    /// Number of players.
    pub fn num_players(&self) -> u32 {
        self.num_players
    }

    /// Owner of every state, if recorded.
    pub fn state_to_player(&self) -> Option<&[u32]> {
        self.state_to_player.as_deref()
    }

    /// Markovian flag of every state, if recorded.
    pub fn markovian(&self) -> Option<&[bool]> {
        self.markovian.as_deref()
    }

    /// Exit rate of every state, if recorded.
    pub fn exit_rates(&self) -> Option<&[f64]> {
        self.exit_rates.as_deref()
    }

    /// True if nothing beyond the defaults is recorded.
    pub fn is_empty(&self) -> bool {
        self.num_players == 0
            && self.state_to_player.is_none()
            && self.markovian.is_none()
            && self.exit_rates.is_none()
    }

    pub(crate) fn set_players(
        &mut self,
        num_states: usize,
        num_players: u32,
        owners: Option<Vec<u32>>,
    ) -> Result<(), ModelError> {
        if let Some(owners) = &owners {
            check_len("state_to_player", owners.len(), num_states)?;
            check_players(owners, num_players)?;
        }
        self.num_players = num_players;
        self.state_to_player = owners;
        Ok(())
    }

    pub(crate) fn set_markovian(&mut self, flags: Option<Vec<bool>>) {
        self.markovian = flags;
    }

    pub(crate) fn set_exit_rates(
        &mut self,
        num_states: usize,
        rates: Option<Vec<f64>>,
    ) -> Result<(), ModelError> {
        if let Some(rates) = &rates {
            check_len("exit_rates", rates.len(), num_states)?;
            check_exit_rates(rates)?;
        }
        self.exit_rates = rates;
        Ok(())
    }

    /// Assemble attributes the decoder already validated.
    pub(crate) fn from_parts(
        num_players: u32,
        state_to_player: Option<Vec<u32>>,
        markovian: Option<Vec<bool>>,
        exit_rates: Option<Vec<f64>>,
    ) -> Self {
        Self {
            num_players,
            state_to_player,
            markovian,
            exit_rates,
        }
    }

    pub(crate) fn validate(&self, num_states: usize) -> Result<(), ModelError> {
        if let Some(owners) = &self.state_to_player {
            check_len("state_to_player", owners.len(), num_states)?;
            check_players(owners, self.num_players)?;
        }
        if let Some(flags) = &self.markovian {
            check_len("markovian_states", flags.len(), num_states)?;
        }
        if let Some(rates) = &self.exit_rates {
            check_len("exit_rates", rates.len(), num_states)?;
            check_exit_rates(rates)?;
        }
        Ok(())
    }
}

fn check_len(attribute: &'static str, len: usize, num_states: usize) -> Result<(), ModelError> {
    if len != num_states {
        return Err(ModelError::AttributeLength {
            attribute,
            len,
            num_states,
        });
    }
    Ok(())
}

pub(crate) fn check_players(owners: &[u32], num_players: u32) -> Result<(), ModelError> {
    match owners.iter().position(|&p| p >= num_players) {
        Some(s) => Err(ModelError::PlayerOutOfRange {
            state: s as StateId,
            player: owners[s],
            num_players,
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_exit_rates(rates: &[f64]) -> Result<(), ModelError> {
    match rates.iter().position(|r| !r.is_finite() || *r < 0.0) {
        Some(s) => Err(ModelError::InvalidExitRate {
            state: s as StateId,
            rate: rates[s],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let attrs = StateAttributes::default();
        assert!(attrs.is_empty());
        assert_eq!(attrs.num_players(), 0);
        assert_eq!(attrs.exit_rates(), None);
    }

    #[test]
    fn test_players_checked() {
        let mut attrs = StateAttributes::default();
        assert_eq!(
            attrs.set_players(3, 2, Some(vec![0, 2, 1])),
            Err(ModelError::PlayerOutOfRange { state: 1, player: 2, num_players: 2 })
        );
        assert!(matches!(
            attrs.set_players(3, 2, Some(vec![0, 1])),
            Err(ModelError::AttributeLength { len: 2, num_states: 3, .. })
        ));
        assert!(attrs.is_empty());

        attrs.set_players(3, 2, Some(vec![0, 1, 1])).unwrap();
        assert_eq!(attrs.state_to_player(), Some(&[0, 1, 1][..]));
        assert!(!attrs.is_empty());
    }

    #[test]
    fn test_exit_rates_checked() {
        let mut attrs = StateAttributes::default();
        assert!(matches!(
            attrs.set_exit_rates(2, Some(vec![1.0, -0.5])),
            Err(ModelError::InvalidExitRate { state: 1, .. })
        ));
        assert!(attrs.set_exit_rates(2, Some(vec![f64::INFINITY, 1.0])).is_err());
        attrs.set_exit_rates(2, Some(vec![0.0, 3.5])).unwrap();
        assert_eq!(attrs.exit_rates(), Some(&[0.0, 3.5][..]));
        attrs.set_exit_rates(2, None).unwrap();
        assert!(attrs.is_empty());
    }
}
