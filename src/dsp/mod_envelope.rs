//! Modulation envelope: a DAHDSR control signal in [0, 1].
//!
//! Same timing generators as the volume envelope but never heard directly;
//! it only bends pitch and filter cutoff. Attack follows a convex curve, the
//! other segments are linear. Times are seconds on the synth clock and the
//! value is evaluated once per block.

use crate::bank::generator::{GeneratorSet, GeneratorType};
use crate::modulation::curves::convex;

use super::units::timecents_to_seconds;

const PEAK: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModEnvelopeParams {
    pub delay: i32,
    pub attack: i32,
    pub hold: i32,
    pub decay: i32,
    /// 0.1 % below peak.
    pub sustain: i32,
    pub release: i32,
    pub key_to_hold: i32,
    pub key_to_decay: i32,
    pub key: u8,
}

impl ModEnvelopeParams {
    pub fn from_generators(generators: &GeneratorSet, key: u8) -> Self {
        let g = |kind: GeneratorType| generators[kind.index()];
        Self {
            delay: g(GeneratorType::DelayModEnv),
            attack: g(GeneratorType::AttackModEnv),
            hold: g(GeneratorType::HoldModEnv),
            decay: g(GeneratorType::DecayModEnv),
            sustain: g(GeneratorType::SustainModEnv),
            release: g(GeneratorType::ReleaseModEnv),
            key_to_hold: g(GeneratorType::KeyNumToModEnvHold),
            key_to_decay: g(GeneratorType::KeyNumToModEnvDecay),
            key,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModulationEnvelope {
    attack_duration: f64,
    decay_duration: f64,
    release_duration: f64,
    sustain_level: f32,
    delay_end: f64,
    attack_end: f64,
    hold_end: f64,
    decay_end: f64,
    release_start: Option<f64>,
    release_start_level: f32,
}

impl ModulationEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds segment ends for a voice started at `start_time`.
    pub fn recalculate(&mut self, params: &ModEnvelopeParams, start_time: f64) {
        if let Some(release_time) = self.release_start {
            self.release_start_level = self.shape_value(release_time);
        }

        let seconds = |tc: i32| timecents_to_seconds(tc as f32) as f64;
        let key_offset = 60 - params.key as i32;

        self.sustain_level = 1.0 - params.sustain as f32 / 1000.0;
        self.attack_duration = seconds(params.attack);
        let decay_time = seconds(params.decay + key_offset * params.key_to_decay);
        self.decay_duration = decay_time * (1.0 - self.sustain_level as f64);
        let hold_duration = seconds(params.hold + key_offset * params.key_to_hold);
        self.release_duration = seconds(params.release) * self.release_start_level as f64;

        self.delay_end = start_time + seconds(params.delay);
        self.attack_end = self.delay_end + self.attack_duration;
        self.hold_end = self.attack_end + hold_duration;
        self.decay_end = self.hold_end + self.decay_duration;
    }

    /// Freezes the level at `release_time` and ramps from it to zero.
    pub fn start_release(&mut self, params: &ModEnvelopeParams, start_time: f64, release_time: f64) {
        self.release_start = Some(release_time);
        self.recalculate(params, start_time);
    }

    /// Envelope level at `now`, in [0, 1].
    pub fn value(&self, now: f64) -> f32 {
        match self.release_start {
            Some(release_time) => {
                if self.release_start_level == 0.0 || self.release_duration <= 0.0 {
                    return 0.0;
                }
                let progress = ((now - release_time) / self.release_duration) as f32;
                ((1.0 - progress) * self.release_start_level).max(0.0)
            }
            None => self.shape_value(now),
        }
    }

    fn shape_value(&self, now: f64) -> f32 {
        if now < self.delay_end {
            0.0
        } else if now < self.attack_end {
            let progress = 1.0 - (self.attack_end - now) / self.attack_duration;
            convex(progress as f32)
        } else if now < self.hold_end {
            PEAK
        } else if now < self.decay_end {
            let progress = (1.0 - (self.decay_end - now) / self.decay_duration) as f32;
            progress * (self.sustain_level - PEAK) + PEAK
        } else {
            self.sustain_level
        }
    }
}
