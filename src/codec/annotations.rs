//! Annotations segment: the label pool, then per-state and per-choice
//! label references.
//!
//! ```text
//! num_labels u32
//! num_labels × (key_len u32 | key | value_tag u8 | value)
//! num_states × (count u32 | ids[count] u32)
//! num_choices u32
//! num_choices × (count u32 | ids[count] u32)
//! ```

use super::segment::{ByteReader, ByteWriter};
use super::SegmentTag;
use crate::error::UmbError;
use crate::types::{AnnotationRefs, AnnotationStore, Label, LabelId, LabelValue};

const VALUE_NONE: u8 = 0;
const VALUE_BOOL: u8 = 1;
const VALUE_INT: u8 = 2;
const VALUE_REAL: u8 = 3;
const VALUE_TEXT: u8 = 4;

pub(crate) fn encode(
    store: &AnnotationStore,
    state_refs: &AnnotationRefs,
    choice_refs: &AnnotationRefs,
) -> Result<(Vec<u8>, u64), UmbError> {
    let mut w = ByteWriter::new();
    w.put_count(store.len(), "labels")?;
    for label in store.labels() {
        w.put_len_prefixed(label.key().as_bytes(), "label key bytes")?;
        match label.value() {
            None => w.put_u8(VALUE_NONE),
            Some(LabelValue::Bool(v)) => {
                w.put_u8(VALUE_BOOL);
                w.put_u8(u8::from(*v));
            }
            Some(LabelValue::Int(v)) => {
                w.put_u8(VALUE_INT);
                w.put_i64(*v);
            }
            Some(LabelValue::Real(v)) => {
                w.put_u8(VALUE_REAL);
                w.put_f64(*v);
            }
            Some(LabelValue::Text(v)) => {
                w.put_u8(VALUE_TEXT);
                w.put_len_prefixed(v.as_bytes(), "label text bytes")?;
            }
        }
    }

    put_rows(&mut w, state_refs)?;
    w.put_count(choice_refs.rows(), "choices")?;
    put_rows(&mut w, choice_refs)?;

    Ok((w.into_inner(), store.len() as u64))
}

fn put_rows(w: &mut ByteWriter, refs: &AnnotationRefs) -> Result<(), UmbError> {
    for row in refs.iter() {
        w.put_count(row.len(), "label references")?;
        for &id in row {
            w.put_u32(id);
        }
    }
    Ok(())
}

/// Decoded annotations: pool, state references, choice references.
pub(crate) type DecodedAnnotations = (AnnotationStore, AnnotationRefs, AnnotationRefs);

pub(crate) fn decode(
    payload: &[u8],
    element_count: u64,
    num_states: usize,
    num_choices: usize,
) -> Result<DecodedAnnotations, UmbError> {
    let mut r = ByteReader::new(payload, "annotations");

    // key_len + value_tag at minimum
    let num_labels = r.count(5)?;
    if num_labels as u64 != element_count {
        return Err(UmbError::format(format!(
            "Annotations header counts {element_count} labels, payload declares {num_labels}"
        )));
    }

    let mut store = AnnotationStore::new();
    for i in 0..num_labels {
        let label = read_label(&mut r)?;
        let id = store.intern(label);
        if id as usize != i {
            return Err(UmbError::integrity(
                SegmentTag::Annotations,
                i as u64,
                format!("label duplicates label {id}"),
            ));
        }
    }

    let state_refs = read_rows(&mut r, num_states, num_labels, "state")?;
    let declared_choices = r.u32()? as usize;
    if declared_choices != num_choices {
        return Err(UmbError::integrity(
            SegmentTag::Annotations,
            num_states as u64,
            format!("annotations cover {declared_choices} choices, transitions define {num_choices}"),
        ));
    }
    let choice_refs = read_rows(&mut r, num_choices, num_labels, "choice")?;
    r.finish()?;

    Ok((store, state_refs, choice_refs))
}

fn read_label(r: &mut ByteReader<'_>) -> Result<Label, UmbError> {
    let key = r.string()?;
    let tag = r.u8()?;
    let value = match tag {
        VALUE_NONE => return Ok(Label::new(key)),
        VALUE_BOOL => match r.u8()? {
            0 => LabelValue::Bool(false),
            1 => LabelValue::Bool(true),
            other => {
                return Err(UmbError::format(format!("Invalid boolean byte {other} in label {key:?}")))
            }
        },
        VALUE_INT => LabelValue::Int(r.i64()?),
        VALUE_REAL => LabelValue::Real(r.f64()?),
        VALUE_TEXT => LabelValue::Text(r.string()?),
        other => {
            return Err(UmbError::format(format!("Unknown label value tag {other} in label {key:?}")))
        }
    };
    Ok(Label::with_value(key, value))
}

fn read_rows(
    r: &mut ByteReader<'_>,
    rows: usize,
    num_labels: usize,
    entity: &str,
) -> Result<AnnotationRefs, UmbError> {
    r.ensure_records(rows, 4)?;
    let mut offsets = Vec::with_capacity(rows + 1);
    let mut ids: Vec<LabelId> = Vec::new();
    offsets.push(0);

    for row in 0..rows {
        let count = r.count(4)?;
        let start = ids.len();
        for _ in 0..count {
            let id = r.u32()?;
            if id as usize >= num_labels {
                return Err(UmbError::integrity(
                    SegmentTag::Annotations,
                    row as u64,
                    format!("{entity} {row} references label {id} >= num_labels {num_labels}"),
                ));
            }
            if ids[start..].contains(&id) {
                return Err(UmbError::integrity(
                    SegmentTag::Annotations,
                    row as u64,
                    format!("{entity} {row} references label {id} twice"),
                ));
            }
            ids.push(id);
        }
        offsets.push(ids.len());
    }
    Ok(AnnotationRefs::from_parts(offsets, ids))
}
