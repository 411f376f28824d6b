//! Benchmarks for wavetable playback.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::bank::generator::{default_generators, GeneratorType};
use saavy_sf::bank::sample::Sample;
use saavy_sf::dsp::oscillator::{Interpolation, WavetableOscillator};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

const TABLE_LEN: usize = 4096;

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");
    let pcm: Vec<f32> = (0..TABLE_LEN)
        .map(|i| (i as f32 / TABLE_LEN as f32 * std::f32::consts::TAU * 8.0).sin())
        .collect();
    let sample = Sample::new("sine", 0, TABLE_LEN as u32, 0, TABLE_LEN as u32, 48_000, 60, 0, 0, 1);
    let mut generators = default_generators();
    generators[GeneratorType::SampleModes.index()] = 1;

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, interpolation) in [
            ("nearest", Interpolation::Nearest),
            ("linear", Interpolation::Linear),
            ("cubic", Interpolation::Cubic),
        ] {
            // Detuned ratio so every sample lands between table points
            let mut osc = WavetableOscillator::new(&sample, SAMPLE_RATE, &generators);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    osc.render(black_box(&pcm), black_box(1.0377), black_box(&mut buffer), interpolation);
                })
            });
        }
    }

    group.finish();
}
