//! Property tests over generated models.

use proptest::prelude::*;

use umb_kernel::codec;
use umb_kernel::{AtsModel, CodecConfig, Compression, Distribution, Label, LabelValue, StateId};

// ================================================================
// Arbitrary Strategies
// ================================================================

/// A choice as raw `(target, weight)` pairs; weights are normalized when the
/// model is built.
fn arb_choice(num_states: StateId) -> impl Strategy<Value = Vec<(StateId, u32)>> {
    proptest::collection::vec((0..num_states, 0u32..100), 1..4)
}

fn arb_label() -> impl Strategy<Value = Label> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|k| Label::new(k)),
        "[a-z]{1,6}".prop_map(|k| Label::action(k)),
        ("[a-z]{1,4}", -1000.0f64..1000.0).prop_map(|(k, v)| Label::reward(k, v)),
        ("[a-z]{1,4}", any::<i64>()).prop_map(|(k, v)| Label::with_value(k, LabelValue::Int(v))),
        ("[a-z]{1,4}", any::<bool>()).prop_map(|(k, v)| Label::with_value(k, LabelValue::Bool(v))),
    ]
}

prop_compose! {
    fn arb_model()(num_states in 1u32..12)(
        num_states in Just(num_states),
        choices in proptest::collection::vec((0..num_states, arb_choice(num_states)), 0..20),
        initial in proptest::collection::vec(0..num_states, 0..3),
        state_labels in proptest::collection::vec((0..num_states, arb_label()), 0..8),
        choice_labels in proptest::collection::vec((any::<prop::sample::Index>(), arb_label()), 0..6),
        exit_rates in proptest::option::of(proptest::collection::vec(0.0f64..100.0, num_states as usize)),
    ) -> AtsModel {
        let mut model = AtsModel::new(num_states);
        for (state, pairs) in choices {
            let total: u32 = pairs.iter().map(|&(_, w)| w).sum();
            let distribution = if total == 0 {
                Distribution::dirac(pairs[0].0)
            } else {
                Distribution::new(
                    pairs.iter().map(|&(t, w)| (t, w as f64 / total as f64)),
                )
                .unwrap()
            };
            model.add_choice(state, distribution).unwrap();
        }
        let mut initial_states = Vec::new();
        for state in initial {
            if !initial_states.contains(&state) {
                initial_states.push(state);
            }
        }
        model.set_initial_states(initial_states).unwrap();
        for (state, label) in state_labels {
            model.label_state(state, label).unwrap();
        }
        model.set_exit_rates(exit_rates).unwrap();
        if model.num_choices() > 0 {
            for (index, label) in choice_labels {
                let choice = index.index(model.num_choices());
                model.label_choice(choice, label).unwrap();
            }
        }
        model
    }
}

proptest! {
    /// Property: decode(encode(m)) == m
    #[test]
    fn prop_roundtrip(model in arb_model()) {
        let decoded = codec::decode(&codec::encode(&model).unwrap()).unwrap();
        prop_assert_eq!(decoded, model);
    }

    /// Property: re-encoding a decoded archive reproduces it exactly
    #[test]
    fn prop_reencode_byte_identical(model in arb_model(), compressed in any::<bool>()) {
        let config = if compressed {
            CodecConfig::default()
        } else {
            CodecConfig::default().with_compression(Compression::None)
        };
        let first = codec::encode_with(&model, &config).unwrap();
        let second = codec::encode_with(&codec::decode_with(&first, &config).unwrap(), &config).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: sampled paths start at the start state, stay within
    /// length + 1 and only follow existing transitions
    #[test]
    fn prop_sample_path_bounds(model in arb_model(), length in 0usize..30, seed in any::<u64>()) {
        let start = (seed % model.num_states() as u64) as StateId;
        let path = model.sample_path(start, length, Some(seed)).unwrap();
        prop_assert!(path.len() <= length + 1);
        prop_assert_eq!(path[0], start);
        for pair in path.windows(2) {
            prop_assert!(model.state_successors(pair[0]).unwrap().contains(&pair[1]));
        }
        if path.len() < length + 1 {
            let last = *path.last().unwrap();
            prop_assert_eq!(model.choices_of(last).unwrap().len(), 0);
        }
    }

    /// Property: a byte flip anywhere in an uncompressed archive never panics
    /// the decoder
    #[test]
    fn prop_corruption_never_panics(model in arb_model(), pos in any::<prop::sample::Index>(), bit in 0u8..8) {
        let config = CodecConfig::default().with_compression(Compression::None);
        let mut bytes = codec::encode_with(&model, &config).unwrap();
        let i = pos.index(bytes.len());
        bytes[i] ^= 1 << bit;
        let _ = codec::decode_with(&bytes, &config);
        let _ = codec::decode_with(&bytes, &config.clone().without_checksums());
    }
}
