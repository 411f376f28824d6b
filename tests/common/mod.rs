#![allow(dead_code)]

use saavy_sf::bank::generator::GeneratorType;
use saavy_sf::bank::parts::{BankBuilder, ZoneBuilder};
use saavy_sf::{InstrumentBank, RenderOutput, SynthConfig, Synthesizer};

pub fn load(builder: BankBuilder) -> InstrumentBank {
    match InstrumentBank::from_parts(builder.build()) {
        Ok(bank) => bank,
        Err(e) => panic!("bank should load: {e}"),
    }
}

pub fn sine(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i as f32 * 0.06).sin() * 0.5).collect()
}

/// Program 0: looped sine pad. Program 1: hi-hat in exclusive class 5.
/// Program 40 sits in bank 0; bank 128 holds a drum kit.
pub fn test_bank() -> InstrumentBank {
    let mut b = BankBuilder::new("test");
    let s = b.add_looped_sample("sine", &sine(4800), 48_000, 60, 200, 4600);
    let pad = b.add_instrument(
        "pad",
        vec![ZoneBuilder::sample(s)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::ReleaseVolEnv, -2400)],
    );
    let hat = b.add_instrument(
        "hat",
        vec![ZoneBuilder::sample(s)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::ExclusiveClass, 5)
            .generator(GeneratorType::ReleaseVolEnv, 1200)],
    );
    b.add_preset("pad", 0, 0, vec![ZoneBuilder::instrument(pad)]);
    b.add_preset("hat", 0, 1, vec![ZoneBuilder::instrument(hat)]);
    b.add_preset("strings", 0, 40, vec![ZoneBuilder::instrument(pad)]);
    b.add_preset("kit", 128, 0, vec![ZoneBuilder::instrument(hat)]);
    load(b)
}

pub fn synth_with(config: SynthConfig, bank: InstrumentBank) -> Synthesizer {
    match Synthesizer::standalone(config, bank) {
        Ok(synth) => synth,
        Err(e) => panic!("synthesizer should start: {e}"),
    }
}

pub fn render(synth: &mut Synthesizer, frames: usize) -> (Vec<f32>, Vec<f32>) {
    let (mut left, mut right) = (vec![0.0; frames], vec![0.0; frames]);
    synth.render_block(&mut RenderOutput::stereo(&mut left, &mut right));
    (left, right)
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}
