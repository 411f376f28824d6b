//! Benchmarks for the resonant lowpass.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sf::dsp::filter::LowpassFilter;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let signal: Vec<f32> = (0..size).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut buffer = signal.clone();

        // Fixed cutoff: coefficients computed once
        let mut filter = LowpassFilter::new(SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("static", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&signal);
                filter.process(black_box(&mut buffer), 9000, 60, 0.0);
            })
        });

        // Swept cutoff: coefficients recomputed every block
        let mut filter = LowpassFilter::new(SAMPLE_RATE);
        let mut excursion = 0.0f32;
        group.bench_with_input(BenchmarkId::new("swept", size), &size, |b, _| {
            b.iter(|| {
                excursion = (excursion + 37.0) % 2400.0;
                buffer.copy_from_slice(&signal);
                filter.process(black_box(&mut buffer), 7000, 120, black_box(excursion));
            })
        });
    }

    group.finish();
}
