//! Benchmarks for the volume envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::bank::generator::{default_generators, GeneratorType};
use saavy_sf::dsp::envelope::{VolumeEnvelope, VolumeEnvelopeParams};
use saavy_sf::dsp::units::GainTable;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let gains = GainTable::new();

    let mut generators = default_generators();
    generators[GeneratorType::AttackVolEnv.index()] = 1200; // 2 s attack
    generators[GeneratorType::DecayVolEnv.index()] = 0;
    generators[GeneratorType::SustainVolEnv.index()] = 200;
    generators[GeneratorType::ReleaseVolEnv.index()] = 1200;
    let params = VolumeEnvelopeParams::from_generators(&generators, 60);

    let mut fast = generators;
    fast[GeneratorType::AttackVolEnv.index()] = -12000;
    fast[GeneratorType::DecayVolEnv.index()] = -12000;
    let fast_params = VolumeEnvelopeParams::from_generators(&fast, 60);

    for &size in BLOCK_SIZES {
        let mut buffer = vec![1.0f32; size];

        // Attack phase (linear gain ramp)
        let mut env = VolumeEnvelope::new(SAMPLE_RATE, 200);
        env.recalculate(&params);
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| {
                buffer.fill(1.0);
                env.apply(black_box(&mut buffer), 0.0, &gains);
            })
        });

        // Sustain phase (constant dB)
        let mut env = VolumeEnvelope::new(SAMPLE_RATE, 200);
        env.recalculate(&fast_params);
        let mut warmup = vec![1.0f32; 4096];
        env.apply(&mut warmup, 0.0, &gains);
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                buffer.fill(1.0);
                env.apply(black_box(&mut buffer), 0.0, &gains);
            })
        });

        // Release phase (dB ramp to silence)
        let mut env = VolumeEnvelope::new(SAMPLE_RATE, 200);
        env.recalculate(&fast_params);
        env.apply(&mut warmup, 0.0, &gains);
        env.start_release(&params);
        group.bench_with_input(BenchmarkId::new("release", size), &size, |b, _| {
            b.iter(|| {
                buffer.fill(1.0);
                env.apply(black_box(&mut buffer), 0.0, &gains);
            })
        });
    }

    group.finish();
}
