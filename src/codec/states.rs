//! States segment: state count and ordered initial states.

use std::collections::BTreeSet;

use super::segment::{ByteReader, ByteWriter};
use super::SegmentTag;
use crate::error::UmbError;
use crate::types::{AtsModel, StateId};

pub(crate) fn encode(model: &AtsModel) -> Result<(Vec<u8>, u64), UmbError> {
    let mut w = ByteWriter::new();
    w.put_count(model.num_states(), "states")?;
    w.put_count(model.initial_states().len(), "initial states")?;
    for &state in model.initial_states() {
        w.put_u32(state);
    }
    Ok((w.into_inner(), model.num_states() as u64))
}

/// Returns `(num_states, initial_states)`.
pub(crate) fn decode(payload: &[u8], element_count: u64) -> Result<(u32, Vec<StateId>), UmbError> {
    let mut r = ByteReader::new(payload, "states");
    let num_states = r.u32()?;
    if num_states as u64 != element_count {
        return Err(UmbError::format(format!(
            "States header counts {element_count} states, payload declares {num_states}"
        )));
    }

    let n = r.count(4)?;
    let mut initial = Vec::with_capacity(n);
    let mut seen = BTreeSet::new();
    for i in 0..n {
        let state = r.u32()?;
        if state >= num_states {
            return Err(UmbError::integrity(
                SegmentTag::States,
                i as u64,
                format!("initial state {state} >= num_states {num_states}"),
            ));
        }
        if !seen.insert(state) {
            return Err(UmbError::integrity(
                SegmentTag::States,
                i as u64,
                format!("initial state {state} listed twice"),
            ));
        }
        initial.push(state);
    }
    r.finish()?;
    Ok((num_states, initial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_layout() {
        let mut model = AtsModel::new(5);
        model.set_initial_states(vec![4, 1]).unwrap();
        let (payload, count) = encode(&model).unwrap();
        assert_eq!(count, 5);
        assert_eq!(payload.len(), 16);
        assert_eq!(decode(&payload, count).unwrap(), (5, vec![4, 1]));
    }

    #[test]
    fn test_initial_out_of_range() {
        let mut w = ByteWriter::new();
        w.put_u32(2);
        w.put_u32(2);
        w.put_u32(0);
        w.put_u32(2);
        let err = decode(&w.into_inner(), 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(matches!(err, UmbError::Integrity { record: 1, .. }));
    }

    #[test]
    fn test_count_mismatch_is_format_error() {
        let mut w = ByteWriter::new();
        w.put_u32(3);
        w.put_u32(0);
        assert_eq!(decode(&w.into_inner(), 4).unwrap_err().kind(), ErrorKind::Format);
    }
}
