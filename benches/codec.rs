//! Performance benchmarks for the UMB codec and path sampling.
//!
//! Run with: `cargo bench --bench codec`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Encode 100k states | <100ms | zstd level 3 |
//! | Decode 100k states | <100ms | Full validation, checksums on |
//! | Sample 1k steps | <100µs | ChaCha8, uniform choice |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use umb_kernel::codec;
use umb_kernel::{AtsModel, CodecConfig, Compression, Distribution, Label, PathSampler};

/// Random model with two choices per state and up to three branches each.
fn make_model(num_states: u32, seed: u64) -> AtsModel {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut model = AtsModel::new(num_states);
    for s in 0..num_states {
        for _ in 0..2 {
            let k = rng.gen_range(1..=3);
            let targets: Vec<u32> = (0..k).map(|_| rng.gen_range(0..num_states)).collect();
            let distribution = Distribution::uniform(&targets).expect("non-empty targets");
            model.add_choice(s, distribution).expect("targets in range");
        }
        if s % 10 == 0 {
            model.label_state(s, Label::new("checkpoint")).expect("state in range");
        }
    }
    model.set_initial_states(vec![0]).expect("state 0 exists");
    model
}

/// Benchmark encoding with and without compression.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for num_states in [1_000u32, 10_000, 100_000] {
        let model = make_model(num_states, 7);
        group.throughput(Throughput::Elements(num_states as u64));

        for (name, compression) in [
            ("none", Compression::None),
            ("zstd", Compression::default()),
        ] {
            let config = CodecConfig::default().with_compression(compression);
            group.bench_with_input(
                BenchmarkId::new(name, num_states),
                &model,
                |b, model| b.iter(|| codec::encode_with(black_box(model), &config).expect("encode")),
            );
        }
    }

    group.finish();
}

/// Benchmark decoding, including full validation.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for num_states in [1_000u32, 10_000, 100_000] {
        let bytes = codec::encode(&make_model(num_states, 7)).expect("encode");
        group.throughput(Throughput::Elements(num_states as u64));
        group.bench_with_input(BenchmarkId::new("zstd", num_states), &bytes, |b, bytes| {
            b.iter(|| codec::decode(black_box(bytes)).expect("decode"))
        });
    }

    group.finish();
}

/// Benchmark random walks.
fn bench_sample(c: &mut Criterion) {
    let model = make_model(10_000, 11);
    let mut group = c.benchmark_group("sample_path");

    for length in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::new("steps", length), &length, |b, &length| {
            let mut sampler = PathSampler::new(&model, Some(42));
            b.iter(|| sampler.sample_path(black_box(0), length).expect("state 0 exists"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_sample);
criterion_main!(benches);
