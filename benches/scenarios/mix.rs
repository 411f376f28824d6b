//! Benchmarks for full mixdown with effect buses.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::{RenderOutput, StereoBus};

use super::playing_synth;
use crate::BLOCK_SIZES;

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/mix");

    for &size in BLOCK_SIZES {
        let mut buses = vec![vec![0.0f32; size]; 6];

        // 32 leads feeding reverb and chorus as well as the dry pair
        let mut synth = playing_synth(32, 1);
        group.bench_with_input(BenchmarkId::new("32_voices_with_sends", size), &size, |b, _| {
            b.iter(|| {
                let [dl, dr, rl, rr, cl, cr] = &mut buses[..] else {
                    unreachable!()
                };
                let mut out = RenderOutput::with_effects(
                    StereoBus::new(dl, dr),
                    StereoBus::new(rl, rr),
                    StereoBus::new(cl, cr),
                );
                synth.render_block(black_box(&mut out));
                synth.take_events();
            })
        });
    }

    group.finish();
}
