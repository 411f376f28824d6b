//! Real-world scenario benchmarks.
//!
//! These render through the whole `Synthesizer`: note-on resolution,
//! modulators, envelopes, filters and the stereo mixdown.

mod mix;
mod voices;

pub use mix::bench_mix;
pub use voices::bench_voices;

use saavy_sf::bank::generator::GeneratorType;
use saavy_sf::bank::parts::{BankBuilder, ZoneBuilder};
use saavy_sf::{InstrumentBank, SynthConfig, SynthMessage, Synthesizer};

use crate::SAMPLE_RATE;

const TABLE_LEN: usize = 2048;

/// Two presets: a looped saw pad (program 0) and a filtered, vibrato lead
/// (program 1), both over one single-cycle-ish wavetable.
pub fn bench_bank() -> InstrumentBank {
    let mut builder = BankBuilder::new("bench");
    let saw: Vec<f32> = (0..TABLE_LEN)
        .map(|i| ((i * 4) % TABLE_LEN) as f32 / TABLE_LEN as f32 * 2.0 - 1.0)
        .collect();
    let s = builder.add_looped_sample("saw", &saw, 48_000, 60, 0, TABLE_LEN);

    let pad = builder.add_instrument(
        "pad",
        vec![ZoneBuilder::sample(s)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::AttackVolEnv, -2400)
            .generator(GeneratorType::ReleaseVolEnv, 0)
            .generator(GeneratorType::Pan, -150)],
    );
    let lead = builder.add_instrument(
        "lead",
        vec![ZoneBuilder::sample(s)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::InitialFilterFc, 6000)
            .generator(GeneratorType::InitialFilterQ, 80)
            .generator(GeneratorType::VibLfoToPitch, 30)
            .generator(GeneratorType::ModEnvToFilterFc, 2400)
            .generator(GeneratorType::DecayModEnv, -1200)
            .generator(GeneratorType::ReverbEffectsSend, 300)],
    );
    builder.add_preset("pad", 0, 0, vec![ZoneBuilder::instrument(pad)]);
    builder.add_preset("lead", 0, 1, vec![ZoneBuilder::instrument(lead)]);
    InstrumentBank::from_parts(builder.build()).expect("bench bank is valid")
}

/// A synthesizer with `voices` notes held, spread over four channels.
pub fn playing_synth(voices: usize, program: u8) -> Synthesizer {
    let config = SynthConfig {
        sample_rate: SAMPLE_RATE,
        voice_cap: voices.max(1),
        ..SynthConfig::default()
    };
    let mut synth = Synthesizer::standalone(config, bench_bank()).expect("bench config is valid");
    for channel in 0..4u8 {
        synth.apply(SynthMessage::ProgramChange { channel, program });
    }
    for i in 0..voices {
        synth.apply(SynthMessage::NoteOn {
            channel: (i % 4) as u8,
            note: 36 + (i % 48) as u8,
            velocity: 80 + (i % 40) as u8,
        });
    }
    synth
}
