//! Benchmarks for panning and effect sends.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::dsp::mix::{MixParams, RenderOutput, StereoBus, StereoPanner, VoiceSends};

use crate::BLOCK_SIZES;

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/mix");

    for &size in BLOCK_SIZES {
        let signal: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
        let params = MixParams::default();

        // Dry stereo only
        let (mut left, mut right) = (vec![0.0f32; size], vec![0.0f32; size]);
        let mut panner = StereoPanner::new();
        let sends = VoiceSends { pan: -200, reverb: 0, chorus: 0 };
        group.bench_with_input(BenchmarkId::new("dry", size), &size, |b, _| {
            b.iter(|| {
                let mut out = RenderOutput::stereo(&mut left, &mut right);
                panner.mix(black_box(&signal), sends, &params, &mut out);
            })
        });

        // Dry plus reverb and chorus buses
        let mut buses = vec![vec![0.0f32; size]; 6];
        let mut panner = StereoPanner::new();
        let sends = VoiceSends { pan: 150, reverb: 400, chorus: 200 };
        group.bench_with_input(BenchmarkId::new("with_sends", size), &size, |b, _| {
            b.iter(|| {
                let [dl, dr, rl, rr, cl, cr] = &mut buses[..] else {
                    unreachable!()
                };
                let mut out = RenderOutput::with_effects(
                    StereoBus::new(dl, dr),
                    StereoBus::new(rl, rr),
                    StereoBus::new(cl, cr),
                );
                panner.mix(black_box(&signal), sends, &params, &mut out);
            })
        });
    }

    group.finish();
}
