//! Attributes segment: players, Markovian flags and exit rates.
//!
//! ```text
//! num_players u32 | present u8
//! [present & 1] num_states × player u32
//! [present & 2] num_states × markovian u8
//! [present & 4] num_states × exit_rate f64
//! ```
//!
//! Written only when the model records any attribute, so archives of plain
//! models keep their layout.

use super::segment::{ByteReader, ByteWriter};
use super::SegmentTag;
use crate::error::UmbError;
use crate::types::StateAttributes;

const HAS_PLAYERS: u8 = 1;
const HAS_MARKOVIAN: u8 = 2;
const HAS_EXIT_RATES: u8 = 4;

pub(crate) fn encode(attrs: &StateAttributes, num_states: usize) -> (Vec<u8>, u64) {
    let mut present = 0;
    if attrs.state_to_player().is_some() {
        present |= HAS_PLAYERS;
    }
    if attrs.markovian().is_some() {
        present |= HAS_MARKOVIAN;
    }
    if attrs.exit_rates().is_some() {
        present |= HAS_EXIT_RATES;
    }

    let mut w = ByteWriter::new();
    w.put_u32(attrs.num_players());
    w.put_u8(present);
    for &player in attrs.state_to_player().unwrap_or_default() {
        w.put_u32(player);
    }
    for &flag in attrs.markovian().unwrap_or_default() {
        w.put_u8(u8::from(flag));
    }
    for &rate in attrs.exit_rates().unwrap_or_default() {
        w.put_f64(rate);
    }
    (w.into_inner(), num_states as u64)
}

pub(crate) fn decode(
    payload: &[u8],
    element_count: u64,
    num_states: usize,
) -> Result<StateAttributes, UmbError> {
    if element_count != num_states as u64 {
        return Err(UmbError::format(format!(
            "Attributes segment covers {element_count} states, model has {num_states}"
        )));
    }

    let mut r = ByteReader::new(payload, "attributes");
    let num_players = r.u32()?;
    let present = r.u8()?;
    if present & !(HAS_PLAYERS | HAS_MARKOVIAN | HAS_EXIT_RATES) != 0 {
        return Err(UmbError::format(format!(
            "Unknown attribute flags {present:#04x}"
        )));
    }

    let state_to_player = if present & HAS_PLAYERS != 0 {
        r.ensure_records(num_states, 4)?;
        let mut owners = Vec::with_capacity(num_states);
        for s in 0..num_states {
            let player = r.u32()?;
            if player >= num_players {
                return Err(UmbError::integrity(
                    SegmentTag::Attributes,
                    s as u64,
                    format!("state owned by player {player} >= num_players {num_players}"),
                ));
            }
            owners.push(player);
        }
        Some(owners)
    } else {
        None
    };

    let markovian = if present & HAS_MARKOVIAN != 0 {
        r.ensure_records(num_states, 1)?;
        let mut flags = Vec::with_capacity(num_states);
        for _ in 0..num_states {
            flags.push(match r.u8()? {
                0 => false,
                1 => true,
                other => {
                    return Err(UmbError::format(format!("Invalid Markovian flag byte {other}")))
                }
            });
        }
        Some(flags)
    } else {
        None
    };

    let exit_rates = if present & HAS_EXIT_RATES != 0 {
        r.ensure_records(num_states, 8)?;
        let mut rates = Vec::with_capacity(num_states);
        for s in 0..num_states {
            let rate = r.f64()?;
            if !rate.is_finite() || rate < 0.0 {
                return Err(UmbError::integrity(
                    SegmentTag::Attributes,
                    s as u64,
                    format!("invalid exit rate {rate}"),
                ));
            }
            rates.push(rate);
        }
        Some(rates)
    } else {
        None
    };
    r.finish()?;

    Ok(StateAttributes::from_parts(
        num_players,
        state_to_player,
        markovian,
        exit_rates,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn attrs() -> StateAttributes {
        StateAttributes::from_parts(
            2,
            Some(vec![0, 1, 1]),
            Some(vec![true, false, true]),
            Some(vec![0.5, 0.0, 2.0]),
        )
    }

    #[test]
    fn test_layout() {
        let (payload, count) = encode(&attrs(), 3);
        assert_eq!(count, 3);
        assert_eq!(payload.len(), 4 + 1 + 3 * 4 + 3 + 3 * 8);
        assert_eq!(payload[4], HAS_PLAYERS | HAS_MARKOVIAN | HAS_EXIT_RATES);
        assert_eq!(decode(&payload, count, 3).unwrap(), attrs());
    }

    #[test]
    fn test_partial_attributes() {
        let only_rates = StateAttributes::from_parts(0, None, None, Some(vec![1.0, 3.0]));
        let (payload, count) = encode(&only_rates, 2);
        assert_eq!(payload.len(), 4 + 1 + 2 * 8);
        assert_eq!(decode(&payload, count, 2).unwrap(), only_rates);
    }

    #[test]
    fn test_negative_rate_is_integrity_error() {
        let mut w = ByteWriter::new();
        w.put_u32(0);
        w.put_u8(HAS_EXIT_RATES);
        w.put_f64(1.0);
        w.put_f64(-2.0);
        let err = decode(&w.into_inner(), 2, 2).unwrap_err();
        assert!(matches!(
            err,
            UmbError::Integrity { segment: SegmentTag::Attributes, record: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_player_is_integrity_error() {
        let mut w = ByteWriter::new();
        w.put_u32(1);
        w.put_u8(HAS_PLAYERS);
        w.put_u32(1);
        let err = decode(&w.into_inner(), 1, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_bad_flags_and_truncation() {
        let mut w = ByteWriter::new();
        w.put_u32(0);
        w.put_u8(0x80);
        assert_eq!(decode(&w.into_inner(), 0, 0).unwrap_err().kind(), ErrorKind::Format);

        let mut w = ByteWriter::new();
        w.put_u32(0);
        w.put_u8(HAS_EXIT_RATES);
        w.put_f64(1.0);
        let err = decode(&w.into_inner(), u32::MAX as u64, u32::MAX as usize).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
