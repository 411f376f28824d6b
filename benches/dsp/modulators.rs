//! Benchmarks for modulator evaluation.

use std::hint::black_box;

use criterion::Criterion;
use saavy_sf::bank::generator::default_generators;
use saavy_sf::bank::modulator::{default_modulators, GeneralSource, SourceKind};
use saavy_sf::modulation::controllers::ControllerTable;
use saavy_sf::modulation::{ModulatorEngine, VoiceSourceContext};

pub fn bench_modulators(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/modulators");
    let engine = ModulatorEngine::new();
    let table = ControllerTable::new();
    let modulators = default_modulators();
    let generators = default_generators();
    let mut modulated = generators;
    let ctx = VoiceSourceContext {
        key: 60,
        velocity: 100,
        poly_pressure: 0,
    };

    // Note-on: every modulator of the voice
    group.bench_function("full", |b| {
        b.iter(|| {
            engine.compute_modulators(black_box(&modulators), &generators, &mut modulated, &table, &ctx);
        })
    });

    // Pitch wheel move: only the destinations it feeds
    let source = SourceKind::General(GeneralSource::PitchWheel);
    group.bench_function("pitch_wheel", |b| {
        b.iter(|| {
            engine.compute_modulators_for_source(
                black_box(&modulators),
                &generators,
                &mut modulated,
                &table,
                &ctx,
                source,
            )
        })
    });

    group.finish();
}
