//! Benchmarks for polyphony: the cost of N sounding voices.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::RenderOutput;

use super::playing_synth;
use crate::BLOCK_SIZES;

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let (mut left, mut right) = (vec![0.0f32; size], vec![0.0f32; size]);

        for (name, voices, program) in [
            ("pad_1", 1, 0),
            ("pad_16", 16, 0),
            ("pad_64", 64, 0),
            ("lead_16", 16, 1),
        ] {
            let mut synth = playing_synth(voices, program);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut out = RenderOutput::stereo(&mut left, &mut right);
                    synth.render_block(black_box(&mut out));
                    // drop the per-block voice counts
                    synth.take_events();
                })
            });
        }
    }

    group.finish();
}
