//! Transitions segment.
//!
//! For each state in ascending order: `num_choices u32`, then per choice
//! `num_branches u32` and `num_branches × (target u32, probability f64)`.
//! This is the canonical form; branch order is kept exactly.

use super::segment::{ByteReader, ByteWriter};
use super::SegmentTag;
use crate::error::UmbError;
use crate::types::distribution::check_branches;
use crate::types::{Branch, TransitionTable};

const BRANCH_LEN: usize = 12;

pub(crate) fn encode(table: &TransitionTable) -> Result<(Vec<u8>, u64), UmbError> {
    let mut w = ByteWriter::new();
    for s in 0..table.num_states() {
        let choices = &table.state_offsets()[s..s + 2];
        w.put_count(choices[1] - choices[0], "choices")?;
        for c in choices[0]..choices[1] {
            let branches = &table.branches()[table.choice_offsets()[c]..table.choice_offsets()[c + 1]];
            w.put_count(branches.len(), "branches")?;
            for branch in branches {
                w.put_u32(branch.target);
                w.put_f64(branch.probability);
            }
        }
    }
    Ok((w.into_inner(), table.num_states() as u64))
}

pub(crate) fn decode(
    payload: &[u8],
    element_count: u64,
    num_states: u32,
    tolerance: f64,
) -> Result<TransitionTable, UmbError> {
    if element_count != num_states as u64 {
        return Err(UmbError::format(format!(
            "Transitions segment covers {element_count} states, model has {num_states}"
        )));
    }

    let mut r = ByteReader::new(payload, "transitions");
    // Every state carries at least its choice count.
    r.ensure_records(num_states as usize, 4)?;
    let mut state_offsets = Vec::with_capacity(num_states as usize + 1);
    let mut choice_offsets = vec![0];
    let mut branches = Vec::new();
    state_offsets.push(0);

    for s in 0..num_states {
        let num_choices = r.count(4)?;
        for c in 0..num_choices {
            let num_branches = r.count(BRANCH_LEN)?;
            let start = branches.len();
            for _ in 0..num_branches {
                let target = r.u32()?;
                let probability = r.f64()?;
                if target >= num_states {
                    return Err(UmbError::integrity(
                        SegmentTag::Transitions,
                        s as u64,
                        format!("choice {c} targets state {target} >= num_states {num_states}"),
                    ));
                }
                branches.push(Branch::new(target, probability));
            }
            check_branches(&branches[start..], tolerance).map_err(|e| {
                UmbError::integrity(SegmentTag::Transitions, s as u64, format!("choice {c}: {e}"))
            })?;
            choice_offsets.push(branches.len());
        }
        state_offsets.push(choice_offsets.len() - 1);
    }
    r.finish()?;

    tracing::trace!(
        states = num_states,
        choices = choice_offsets.len() - 1,
        branches = branches.len(),
        "Decoded transitions segment"
    );
    Ok(TransitionTable::from_parts(state_offsets, choice_offsets, branches))
}
